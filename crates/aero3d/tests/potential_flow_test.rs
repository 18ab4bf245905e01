//! End-to-end potential flow tests
//!
//! Runs solve -> derive -> trace on empty and obstructed domains and checks
//! boundary faces, obstacle masking, deflection and determinism.

use aero3d::{
    derive_velocity, inlet_seeds, trace_streamlines, AirflowSimulation3D, FlowError, GridDims,
    IntegrationParams, ObstacleTreatment, OccupancyGrid, PotentialSolver, RelaxationScheme,
    SimulationConfig, SolverParams, Termination, Vec3,
};

/// 16^3 domain with a 4^3 solid cube at cells 6..10 on every axis
fn centered_cube() -> OccupancyGrid {
    let mut grid = OccupancyGrid::new(GridDims::cubic(16));
    grid.fill_box([6, 6, 6], [10, 10, 10]);
    grid
}

fn mirrored(inflow: f32, iterations: usize) -> SolverParams {
    SolverParams {
        obstacles: ObstacleTreatment::MirroredNeumann,
        ..SolverParams::with_inflow(inflow, iterations)
    }
}

/// Fluid cells sharing a face with a solid cell
fn halo_cells(grid: &OccupancyGrid) -> Vec<(usize, usize, usize)> {
    let dims = grid.dims();
    let mut halo = Vec::new();
    for k in 0..dims.nz {
        for j in 0..dims.ny {
            for i in 0..dims.nx {
                if grid.is_solid(i, j, k) {
                    continue;
                }
                let touches = [
                    (i.wrapping_sub(1), j, k),
                    (i + 1, j, k),
                    (i, j.wrapping_sub(1), k),
                    (i, j + 1, k),
                    (i, j, k.wrapping_sub(1)),
                    (i, j, k + 1),
                ]
                .iter()
                .any(|&(a, b, c)| grid.is_solid(a, b, c));
                if touches {
                    halo.push((i, j, k));
                }
            }
        }
    }
    halo
}

#[test]
fn test_empty_domain_is_uniform_flow() {
    let grid = OccupancyGrid::new(GridDims::cubic(8));
    let solver = PotentialSolver::new(GridDims::cubic(8), &grid).unwrap();
    let solution = solver.solve(&SolverParams::with_inflow(1.0, 200)).unwrap();
    let velocity = derive_velocity(&solution.field, &grid).unwrap();

    for k in 1..7 {
        for j in 1..7 {
            for i in 1..7 {
                let v = velocity.at(i, j, k);
                assert!(v.y.abs() < 0.05, "vy at ({}, {}, {}) = {}", i, j, k, v.y);
                assert!(v.z.abs() < 0.05, "vz at ({}, {}, {}) = {}", i, j, k, v.z);
                assert!((v.x - 1.0).abs() < 0.1, "vx at ({}, {}, {}) = {}", i, j, k, v.x);
            }
        }
    }
}

#[test]
fn test_faces_pinned_after_every_iteration() {
    let grid = centered_cube();
    let solver = PotentialSolver::new(grid.dims(), &grid).unwrap();
    let mut checked = 0;

    solver
        .solve_observed(&mirrored(2.0, 40), |iteration, field| {
            assert!(
                field.face_values(0).iter().all(|&v| v == 0.0),
                "inlet drifted at iteration {}",
                iteration
            );
            assert!(
                field.face_values(15).iter().all(|&v| v == 30.0),
                "outlet drifted at iteration {}",
                iteration
            );
            checked += 1;
        })
        .unwrap();

    assert_eq!(checked, 40);
}

#[test]
fn test_solid_cells_have_zero_velocity() {
    let grid = centered_cube();
    for obstacles in [ObstacleTreatment::VelocityMask, ObstacleTreatment::MirroredNeumann] {
        let params = SolverParams {
            obstacles,
            ..SolverParams::with_inflow(1.0, 100)
        };
        let solution = PotentialSolver::new(grid.dims(), &grid)
            .unwrap()
            .solve(&params)
            .unwrap();
        let velocity = derive_velocity(&solution.field, &grid).unwrap();

        for k in 6..10 {
            for j in 6..10 {
                for i in 6..10 {
                    assert_eq!(velocity.at(i, j, k), Vec3::ZERO);
                }
            }
        }
    }
}

#[test]
fn test_velocity_mask_leaves_potential_unbent() {
    // Obstacles are invisible to the relaxation; only the mask sees them
    let grid = centered_cube();
    let solution = PotentialSolver::new(grid.dims(), &grid)
        .unwrap()
        .solve(&SolverParams::with_inflow(1.0, 200))
        .unwrap();
    let velocity = derive_velocity(&solution.field, &grid).unwrap();

    for (i, j, k) in halo_cells(&grid) {
        let v = velocity.at(i, j, k);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.z, 0.0);
    }
}

#[test]
fn test_mirrored_obstacle_deflects_flow() {
    let grid = centered_cube();
    let solution = PotentialSolver::new(grid.dims(), &grid)
        .unwrap()
        .solve(&mirrored(1.0, 200))
        .unwrap();
    let velocity = derive_velocity(&solution.field, &grid).unwrap();
    assert!(velocity.is_finite());

    let max_lateral = halo_cells(&grid)
        .into_iter()
        .map(|(i, j, k)| {
            let v = velocity.at(i, j, k);
            v.y.abs().max(v.z.abs())
        })
        .fold(0.0, f32::max);
    assert!(
        max_lateral > 0.02,
        "expected lateral flow around the cube, max |v_lat| = {}",
        max_lateral
    );

    let params = IntegrationParams::default();
    let lines = trace_streamlines(
        &velocity,
        &[Vec3::new(0.0, 8.0, 8.0), Vec3::new(0.0, 0.0, 0.0)],
        &params,
    )
    .unwrap();

    // In line with the cube: lateral velocity shows up along the path
    let inline_lateral = lines[0]
        .points
        .iter()
        .filter_map(|&p| velocity.sample_nearest(p))
        .map(|v| v.y.abs().max(v.z.abs()))
        .fold(0.0, f32::max);
    assert!(
        inline_lateral > 0.0,
        "in-line streamline saw no lateral velocity"
    );

    // Domain corner, far from the cube: stays close to a straight line
    let far = &lines[1];
    assert!(
        far.max_lateral_deviation() < 0.75,
        "far streamline deviated by {}",
        far.max_lateral_deviation()
    );
}

#[test]
fn test_streamline_points_stay_in_domain() {
    let grid = centered_cube();
    let dims = grid.dims();
    let solution = PotentialSolver::new(dims, &grid)
        .unwrap()
        .solve(&mirrored(1.0, 200))
        .unwrap();
    let velocity = derive_velocity(&solution.field, &grid).unwrap();
    let seeds = inlet_seeds(dims, 2).unwrap();
    let lines = trace_streamlines(&velocity, &seeds, &IntegrationParams::default()).unwrap();

    assert_eq!(lines.len(), 64);
    for line in &lines {
        assert!(line.points.iter().all(|&p| dims.contains_point(p)));
        match line.termination {
            Termination::StepBudget => assert_eq!(line.steps(), 100),
            Termination::ExitedDomain => assert!(line.steps() < 100),
        }
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let config = SimulationConfig {
        resolution: GridDims::cubic(16),
        solver: mirrored(1.0, 120),
        ..SimulationConfig::default()
    };
    let sim = AirflowSimulation3D::new(config).with_geometry(centered_cube());

    let a = sim.run_with_fields().unwrap();
    let b = sim.run_with_fields().unwrap();

    let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(a.potential.values()), bits(b.potential.values()));
    assert_eq!(bits(a.velocity.vx()), bits(b.velocity.vx()));
    assert_eq!(bits(a.velocity.vy()), bits(b.velocity.vy()));
    assert_eq!(bits(a.velocity.vz()), bits(b.velocity.vz()));
    assert_eq!(a.output.streamlines, b.output.streamlines);
    assert_eq!(a.output.report.final_max_update, b.output.report.final_max_update);
}

#[test]
fn test_over_relaxed_jacobi_reports_divergence() {
    let config = SimulationConfig {
        resolution: GridDims::cubic(16),
        solver: SolverParams {
            scheme: RelaxationScheme::Jacobi,
            ..mirrored(1.0, 200)
        },
        ..SimulationConfig::default()
    };
    let sim = AirflowSimulation3D::new(config).with_geometry(centered_cube());

    match sim.run() {
        Err(FlowError::NumericalDivergence { iteration, max_abs }) => {
            assert!(iteration <= 200);
            assert!(max_abs > 15.0);
        }
        other => panic!("expected NumericalDivergence, got {:?}", other),
    }
}

#[test]
fn test_pipeline_error_kinds() {
    let sim = AirflowSimulation3D::new(SimulationConfig::default());
    let err = sim.run().unwrap_err();
    assert!(matches!(err, FlowError::MissingInput(_)));

    // Default resolution is 64^3; a 16^3 grid does not fit it
    let sim = AirflowSimulation3D::new(SimulationConfig::default()).with_geometry(centered_cube());
    let err = sim.run().unwrap_err();
    assert!(matches!(err, FlowError::ShapeMismatch { .. }));
    assert!(err.is_config_error());
}
