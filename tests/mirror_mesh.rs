mod util;
use util::*;

use sem_coupling::algs::communicator::{Communicator, NoComm};
use sem_coupling::config::{AppContext, MeshConfig, ProblemConfig};
use sem_coupling::coupling::CouplingMode;
use sem_coupling::coupling_error::CouplingError;
use sem_coupling::mirror::{ElementKind, MirrorMeshBuilder, MirrorOrder, SideEntry};

fn assert_point(got: [f64; 3], want: [f64; 3]) {
    for d in 0..3 {
        assert_close(got[d], want[d], 1e-12);
    }
}

#[test]
fn first_order_surface_uses_face_corners() {
    let solver = BoxSolver::serial([2, 1, 1], 4);
    let mode = CouplingMode::build(&solver, Some(&[Z_MIN]), false, &NoComm).unwrap();
    let mesh = MirrorMeshBuilder::new(&solver, &NoComm)
        .build_mesh(Some(&mode))
        .unwrap();
    assert_eq!(mesh.kind(), ElementKind::Quad4);
    assert_eq!(mesh.n_elements(), 2);
    let want = [
        [1.0, 0.0, 0.0],
        [2.0, 0.0, 0.0],
        [2.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];
    for (got, want) in mesh.element_vertices(1).iter().zip(want) {
        assert_point(*got, want);
    }
    assert_eq!(mesh.faces_on_boundary(0), Err(CouplingError::NotCoupled("volume")));
}

#[test]
fn second_order_volume_places_midside_nodes() {
    let solver = BoxSolver::serial([1, 1, 1], 5);
    let mode = CouplingMode::build(&solver, None, true, &NoComm).unwrap();
    let mesh = MirrorMeshBuilder::new(&solver, &NoComm)
        .order(MirrorOrder::Second)
        .scaling(2.0)
        .build_mesh(Some(&mode))
        .unwrap();
    assert_eq!(mesh.kind(), ElementKind::Hex27);
    let v = mesh.element_vertices(0);
    assert_eq!(v.len(), 27);
    assert_point(v[6], [2.0, 2.0, 2.0]);
    assert_point(v[8], [1.0, 0.0, 0.0]);
    assert_point(v[12], [0.0, 0.0, 1.0]);
    assert_point(v[20], [1.0, 1.0, 0.0]);
    assert_point(v[22], [2.0, 1.0, 1.0]);
    assert_point(v[26], [1.0, 1.0, 1.0]);
    assert_eq!(mesh.faces_on_boundary(0), Ok(0));
    assert_eq!(mesh.boundary_id(0, 2), Ok(-1));
}

#[test]
fn both_couplings_attach_sidesets() {
    let solver = BoxSolver::serial([1, 1, 1], 3);
    let mode = CouplingMode::build(&solver, Some(&[X_MIN, Z_MAX]), true, &NoComm).unwrap();
    let mesh = MirrorMeshBuilder::new(&solver, &NoComm)
        .build_mesh(Some(&mode))
        .unwrap();
    assert_eq!(mesh.kind(), ElementKind::Hex8);
    assert_eq!(mesh.faces_on_boundary(0), Ok(2));
    assert_eq!(mesh.boundary_id(0, 4), Ok(X_MIN));
    assert_eq!(mesh.boundary_id(0, 5), Ok(Z_MAX));
    assert_eq!(mesh.boundary_id(0, 0), Ok(-1));
    assert_eq!(
        mesh.sidesets(),
        &[
            SideEntry {
                element: 0,
                side: 4,
                boundary_id: X_MIN
            },
            SideEntry {
                element: 0,
                side: 5,
                boundary_id: Z_MAX
            },
        ]
    );
    assert!(matches!(
        mesh.boundary_id(3, 0),
        Err(CouplingError::IndexOutOfBounds { .. })
    ));
}

#[test]
fn mirrored_solver_geometry_is_rejected() {
    let solver = BoxSolver::serial([1, 1, 1], 3).with_spacing(-1.0);
    let mode = CouplingMode::build(&solver, None, true, &NoComm).unwrap();
    let err = MirrorMeshBuilder::new(&solver, &NoComm)
        .build_mesh(Some(&mode))
        .unwrap_err();
    assert!(matches!(err, CouplingError::InvalidGeometry(_)));
}

#[test]
fn every_rank_sees_the_same_mirror() {
    let counts = [2, 1, 1];
    let meshes = run_ranks(3, |comm| {
        let solver = BoxSolver::partitioned([4, 1, 1], 3, &counts, comm.rank());
        let mode = CouplingMode::build(&solver, None, true, comm).unwrap();
        MirrorMeshBuilder::new(&solver, comm)
            .order(MirrorOrder::Second)
            .build_mesh(Some(&mode))
            .unwrap()
    });
    for mesh in &meshes {
        assert_eq!(mesh.n_elements(), 4);
        assert_eq!(mesh.owners(), &[0, 0, 1, 2]);
        assert_eq!(mesh.vertices(), meshes[0].vertices());
        assert_point(mesh.element_vertices(3)[26], [3.5, 0.5, 0.5]);
    }
}

#[test]
fn build_only_gets_the_dummy_mesh() {
    let solver = BoxSolver::serial([1, 1, 1], 3);
    let mesh = MirrorMeshBuilder::new(&solver, &NoComm)
        .build_only(true)
        .build_mesh(None)
        .unwrap();
    assert_eq!(mesh.kind(), ElementKind::Quad4);
    assert_eq!(mesh.n_elements(), 1);

    let err = MirrorMeshBuilder::new(&solver, &NoComm)
        .build_mesh(None)
        .unwrap_err();
    assert!(matches!(err, CouplingError::Config(_)));
}

#[test]
fn mesh_options_drive_the_builder() {
    let solver = BoxSolver::serial([1, 1, 1], 5);
    let cfg = MeshConfig {
        boundary: Some(vec![X_MIN]),
        volume: true,
        order: MirrorOrder::Second,
        scaling: 2.0,
    };
    let builder = MirrorMeshBuilder::from_config(
        &solver,
        &NoComm,
        &cfg,
        &ProblemConfig::default(),
        &AppContext::default(),
    )
    .unwrap();
    let mode = builder.coupling_mode(&cfg).unwrap().unwrap();
    assert_eq!(mode.name(), "boundary+volume");
    let mesh = builder.build_mesh(Some(&mode)).unwrap();
    assert_eq!(mesh.kind(), ElementKind::Hex27);
    assert_eq!(mesh.scaling(), 2.0);
    assert_eq!(mesh.faces_on_boundary(0), Ok(1));
    assert_point(mesh.element_vertices(0)[6], [2.0, 2.0, 2.0]);
}

#[test]
fn mesh_options_are_validated_first() {
    let solver = BoxSolver::serial([1, 1, 1], 3);
    let cfg = MeshConfig {
        volume: true,
        scaling: 0.5,
        ..MeshConfig::default()
    };
    let problem = ProblemConfig {
        nondimensional: true,
        u_ref: Some(1.0),
        t_ref: Some(0.0),
        dt_ref: Some(1.0),
        l_ref: Some(0.25),
        rho_0: Some(1.0),
        cp_0: Some(1.0),
        ..ProblemConfig::default()
    };
    let err = MirrorMeshBuilder::from_config(&solver, &NoComm, &cfg, &problem, &AppContext::default())
        .err()
        .unwrap();
    assert_eq!(err, CouplingError::ScalingMismatch { scaling: 0.5, l_ref: 0.25 });

    let none = MeshConfig::default();
    let err = MirrorMeshBuilder::from_config(
        &solver,
        &NoComm,
        &none,
        &ProblemConfig::default(),
        &AppContext::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CouplingError::Config(_)));
}

#[test]
fn build_only_context_skips_the_coupling() {
    let solver = BoxSolver::serial([1, 1, 1], 3);
    let ctx = AppContext {
        build_only: true,
        ..AppContext::default()
    };
    let cfg = MeshConfig::default();
    let builder =
        MirrorMeshBuilder::from_config(&solver, &NoComm, &cfg, &ProblemConfig::default(), &ctx)
            .unwrap();
    let mode = builder.coupling_mode(&cfg).unwrap();
    assert!(mode.is_none());
    let mesh = builder.build_mesh(mode.as_ref()).unwrap();
    assert_eq!(mesh.kind(), ElementKind::Quad4);
    assert_eq!(mesh.n_elements(), 1);
}
