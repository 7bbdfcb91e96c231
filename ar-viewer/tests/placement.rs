mod common;

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use ar_viewer::boundary::recording::OverlayCall;
use ar_viewer::boundary::runtime::{AnchorId, SessionEvent, VisibilityState};
use ar_viewer::boundary::simulated::{SimulatedDevice, SimulatedFrame};
use ar_viewer::boundary::{Affordance, AssetError, AssetKind, Hint, NodeSource};
use ar_viewer::engine::backend::ArBackend;
use ar_viewer::engine::math::Pose;
use ar_viewer::engine::session::EndReason;
use ar_viewer::engine::surface::SurfaceClass;
use ar_viewer::tools::placement::{Anchoring, PlacementState, SpawnTrigger};
use bevy::math::{Mat4, Quat, Vec3};
use common::{EYE, WorldRig, floor_hit, looking_ahead, looking_down, wall_hit};

#[test]
fn floor_auto_spawn_after_delay() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);
    let floor = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit);

    rig.stream(0.0, 2900.0, 100.0, floor);
    assert!(rig.loader.requests().is_empty());
    assert_eq!(rig.backend.engine().state(), PlacementState::Stable);

    rig.frame(floor(3000.0));
    assert_eq!(
        rig.loader.requests(),
        vec![(AssetKind::FloorAsset, rig.config.floor_asset.path.clone())]
    );

    rig.frame(floor(3100.0));
    let engine = rig.backend.engine();
    assert_eq!(engine.state(), PlacementState::Placed);
    assert_eq!(engine.current_asset_kind(), Some(AssetKind::FloorAsset));
    assert_eq!(engine.spawns().len(), 1);
    assert_eq!(engine.spawns()[0].trigger, SpawnTrigger::Auto);

    let root = Pose::from_matrix(rig.root_world().expect("content placed"));
    assert!(root.position().abs_diff_eq(hit.position(), 1e-5));
    assert!(root.axis_y().abs_diff_eq(Vec3::Y, 1e-5));
    // Debug reticle is off by default.
    assert!(rig.scene.graph().reticle().is_none());
}

#[test]
fn auto_spawn_waits_for_late_stability() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);

    rig.stream(0.0, 2400.0, 100.0, |t| SimulatedFrame::at(t).with_viewer(viewer));
    rig.stream(2500.0, 3900.0, 100.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit));
    assert!(rig.loader.requests().is_empty(), "stable only since 2500 ms");

    rig.frame(SimulatedFrame::at(4000.0).with_viewer(viewer).with_hit(hit));
    assert_eq!(rig.loader.requests().len(), 1);
}

#[test]
fn jittering_reticle_never_auto_spawns() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);

    rig.stream(0.0, 8000.0, 100.0, |t| {
        // Each frame lands 10 cm from the last.
        let x = if (t / 100.0) as u64 % 2 == 0 { 0.0 } else { 0.1 };
        SimulatedFrame::at(t).with_viewer(viewer).with_hit(floor_hit(x, -1.5))
    });
    assert!(rig.loader.requests().is_empty());
    assert_eq!(rig.backend.engine().state(), PlacementState::Searching);
}

#[test]
fn class_flip_restarts_stability() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let floor = floor_hit(0.0, -2.0);
    let wall = wall_hit(Vec3::new(0.0, 0.0, -2.0));

    rig.stream(0.0, 1500.0, 100.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(floor));
    assert_eq!(rig.backend.engine().state(), PlacementState::Stable);

    // Same position, different surface class.
    rig.frame(SimulatedFrame::at(1600.0).with_viewer(viewer).with_hit(wall));
    assert_eq!(rig.backend.engine().state(), PlacementState::Searching);
    assert_eq!(rig.backend.engine().reticle().stable_for(1600.0), Some(0.0));
}

#[test]
fn wall_tap_places_rotated_content() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let hit = wall_hit(Vec3::new(0.0, 1.5, -2.0));
    let wall = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit);

    rig.stream(0.0, 300.0, 100.0, wall);
    let reticle = rig.backend.engine().reticle();
    assert!(reticle.state().visible);
    assert_eq!(reticle.target().map(|(_, class)| class), Some(SurfaceClass::Wall));

    rig.frame(wall(400.0).tap());
    assert_eq!(
        rig.loader.requests(),
        vec![(AssetKind::WallAsset, rig.config.wall_asset.path.clone())]
    );
    rig.frame(wall(500.0));

    let engine = rig.backend.engine();
    assert_eq!(engine.state(), PlacementState::Placed);
    assert_eq!(engine.spawns()[0].trigger, SpawnTrigger::Tap);
    let expected = hit.matrix() * Mat4::from_rotation_x(-FRAC_PI_2);
    assert!(rig.root_world().expect("content placed").abs_diff_eq(expected, 1e-5));

    // Past the auto-spawn delay nothing else happens.
    rig.stream(600.0, 6000.0, 100.0, wall);
    assert_eq!(rig.backend.engine().spawns().len(), 1);
    assert_eq!(rig.loader.requests().len(), 1);
    assert!(rig.handle.deleted_anchors().is_empty());
    assert_eq!(rig.handle.live_anchor_count(), 1);
}

#[test]
fn walking_away_respawns_after_cooldown() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let first = floor_hit(0.0, -1.5);
    let here = looking_down(EYE);
    let there = looking_down(EYE + Vec3::new(4.0, 0.0, 0.0));
    let moved = floor_hit(4.0, -1.5);

    rig.frame(SimulatedFrame::at(0.0).with_viewer(here).with_hit(first).tap());
    rig.frame(SimulatedFrame::at(100.0).with_viewer(here).with_hit(first));
    assert_eq!(rig.backend.engine().state(), PlacementState::Placed);

    let walked = move |t: f64| SimulatedFrame::at(t).with_viewer(there).with_hit(moved);
    rig.stream(200.0, 2000.0, 100.0, walked);
    assert_eq!(rig.backend.engine().spawns().len(), 1, "cooldown still running");

    rig.frame(walked(2100.0));
    let engine = rig.backend.engine();
    let spawns = engine.spawns();
    assert_eq!(spawns.len(), 2);
    assert_eq!(spawns[1].trigger, SpawnTrigger::Respawn);
    assert!(spawns[1].at_ms - spawns[0].at_ms >= rig.config.respawn_cooldown_ms);

    // Same kind: moved and re-anchored without another load.
    assert_eq!(rig.loader.requests().len(), 1);
    assert_eq!(rig.handle.deleted_anchors(), vec![AnchorId(1)]);
    assert_eq!(rig.handle.live_anchor_count(), 1);
    assert!(rig.handle.anchor_poses()[0].position().abs_diff_eq(moved.position(), 1e-5));
    let root = Pose::from_matrix(rig.root_world().expect("content placed"));
    assert!(root.position().abs_diff_eq(moved.position(), 1e-5));
}

#[test]
fn respawn_replaces_orientation() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let front = wall_hit(Vec3::new(0.0, 1.5, -2.0));
    // Side wall facing +X.
    let side = Pose::from_rotation_translation(Quat::from_rotation_z(-FRAC_PI_2), Vec3::new(-2.0, 1.5, 0.0));

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(front).tap());
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer).with_hit(front));
    rig.frame(SimulatedFrame::at(200.0).with_viewer(viewer).with_hit(side).tap());
    rig.stream(300.0, 500.0, 100.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(side));

    let expected = side.matrix() * Mat4::from_rotation_x(-FRAC_PI_2);
    assert!(rig.root_world().expect("content placed").abs_diff_eq(expected, 1e-5));
    assert_eq!(rig.backend.engine().spawns().len(), 2);
    assert_eq!(rig.loader.requests().len(), 1);
}

#[test]
fn changing_surface_swaps_content() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let wall = wall_hit(Vec3::new(0.0, 1.5, -2.0));
    let floor = floor_hit(0.0, -1.5);

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(wall).tap());
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer).with_hit(wall));
    let wall_root = rig.backend.engine().content().expect("wall content").root;

    rig.frame(SimulatedFrame::at(200.0).with_viewer(viewer).with_hit(floor).tap());
    rig.frame(SimulatedFrame::at(300.0).with_viewer(viewer).with_hit(floor));

    let engine = rig.backend.engine();
    assert_eq!(engine.current_asset_kind(), Some(AssetKind::FloorAsset));
    assert!(rig.scene.graph().node(wall_root).is_none(), "old content disposed");
    assert_eq!(rig.scene.graph().content_nodes().len(), 1);
    assert_eq!(rig.handle.live_anchor_count(), 1);
    let root = Pose::from_matrix(rig.root_world().expect("floor content"));
    assert!(root.axis_y().abs_diff_eq(Vec3::Y, 1e-5));
}

#[test]
fn gaze_dwell_offers_continue_once() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let hit = wall_hit(Vec3::new(0.0, 1.5, -2.0));
    let wall = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit);
    let continue_shown = OverlayCall::Show(Affordance::ContinueToQuiz);

    rig.frame(wall(0.0).tap());
    rig.stream(50.0, 2000.0, 50.0, wall);
    assert!(rig.backend.engine().gaze_state().gazing);
    assert_eq!(rig.overlay.count(&continue_shown), 0);

    // Shown on the frame after the dwell is reached.
    rig.frame(wall(2050.0));
    assert!(rig.backend.engine().continue_shown());
    assert_eq!(rig.overlay.count(&continue_shown), 1);

    rig.stream(2100.0, 5000.0, 50.0, wall);
    assert_eq!(rig.overlay.count(&continue_shown), 1);

    rig.backend.exit_to_quiz(&mut rig.boundary);
    assert_eq!(rig.quiz.presented(), vec![AssetKind::WallAsset]);
    assert!(!rig.backend.is_running());
    assert!(rig.handle.session_ended());
    assert_eq!(rig.overlay.count(&OverlayCall::RestorePreAr), 0);
}

#[test]
fn looking_away_drops_dwell() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let away = Pose::from_rotation_translation(Quat::from_rotation_y(FRAC_PI_2), EYE);
    let hit = wall_hit(Vec3::new(0.0, 1.5, -2.0));

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(hit).tap());
    rig.stream(50.0, 1500.0, 50.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit));
    assert!(rig.backend.engine().gaze_state().dwell_ms > 1000.0);

    rig.frame(SimulatedFrame::at(1550.0).with_viewer(away));
    let gaze = rig.backend.engine().gaze_state();
    assert!(!gaze.gazing);
    assert_eq!(gaze.dwell_ms, 0.0);

    // A full dwell is needed again.
    rig.stream(1600.0, 3500.0, 50.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit));
    assert!(!rig.backend.engine().continue_shown());
    rig.stream(3550.0, 3700.0, 50.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit));
    assert!(rig.backend.engine().continue_shown());
}

#[test]
fn tap_without_hit_test_places_ahead_of_camera() {
    let mut rig = WorldRig::started(SimulatedDevice::default().without_hit_test());
    let viewer = looking_down(EYE);
    let frame = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer);

    rig.stream(0.0, 5000.0, 100.0, frame);
    assert!(rig.loader.requests().is_empty(), "gaze targets never auto-spawn");

    rig.frame(frame(5100.0).tap());
    rig.frame(frame(5200.0));

    let engine = rig.backend.engine();
    let content = engine.content().expect("content placed");
    assert_eq!(content.kind, AssetKind::FloorAsset);
    assert_eq!(content.class, SurfaceClass::Floor);

    let ahead = viewer.point_ahead(rig.config.fallback_distance_m);
    let root = Pose::from_matrix(rig.root_world().expect("content placed"));
    assert!(root.position().abs_diff_eq(ahead, 1e-4));
    let to_camera = (EYE - ahead).normalize();
    assert!(root.axis_z().abs_diff_eq(to_camera, 1e-4));
}

#[test]
fn level_tap_without_hit_test_is_wall() {
    let mut rig = WorldRig::started(SimulatedDevice::default().without_hit_test());
    let viewer = Pose::from_rotation_translation(Quat::from_rotation_x(-FRAC_PI_4 * 0.2), EYE);

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).tap());
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer));
    assert_eq!(rig.backend.engine().current_asset_kind(), Some(AssetKind::WallAsset));
}

#[test]
fn content_is_held_by_exactly_one_anchoring() {
    let mut rig = WorldRig::started(SimulatedDevice::default().without_anchors());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(hit).tap());
    rig.stream(100.0, 600.0, 100.0, |t| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit));

    let content = rig.backend.engine().content().expect("content placed");
    assert!(matches!(content.anchoring, Anchoring::Anchor(_)));
    assert_eq!(rig.handle.live_anchor_count(), 0, "stored pose only");
    assert_eq!(rig.backend.engine().state(), PlacementState::Placed);
    let root = Pose::from_matrix(rig.root_world().expect("content placed"));
    assert!(root.position().abs_diff_eq(hit.position(), 1e-5));
}

#[test]
fn lost_anchor_holds_content_until_recovered() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);
    let floor = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit);

    rig.frame(floor(0.0).tap());
    rig.stream(100.0, 300.0, 100.0, floor);
    let placed = rig.root_world().expect("content placed");

    rig.handle.set_anchors_tracked(false);
    rig.frame(floor(400.0));
    assert_eq!(rig.backend.engine().state(), PlacementState::Lost);
    assert_eq!(rig.overlay.count(&OverlayCall::Hint(Hint::Relocalising)), 1);
    assert_eq!(rig.root_world(), Some(placed));
    assert!(!rig.backend.engine().gaze_state().gazing);

    rig.handle.set_anchors_tracked(true);
    rig.frame(floor(500.0));
    assert_eq!(rig.backend.engine().state(), PlacementState::Placed);
}

#[test]
fn failed_load_places_placeholder() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let path = rig.config.floor_asset.path.clone();
    rig.loader.fail(
        &path,
        AssetError::Decode {
            path: path.clone(),
            reason: "truncated buffer".to_string(),
        },
    );
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(hit).tap());
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer).with_hit(hit));

    assert_eq!(rig.overlay.errors().len(), 1);
    assert!(rig.overlay.errors()[0].contains(&path));
    let body = rig.backend.engine().content().expect("placeholder placed").body;
    let graph = rig.scene.graph();
    assert!(matches!(
        graph.node(body).map(|n| &n.source),
        Some(NodeSource::Placeholder {
            kind: AssetKind::FloorAsset,
            ..
        })
    ));
}

#[test]
fn hidden_page_holds_timers_and_drops_taps() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);
    let floor = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit);

    rig.stream(0.0, 900.0, 100.0, floor);
    rig.frame(floor(1000.0).with_event(SessionEvent::VisibilityChange(VisibilityState::Hidden)));
    rig.stream(1100.0, 2900.0, 100.0, floor);
    rig.frame(floor(3000.0).tap());
    rig.stream(3100.0, 4900.0, 100.0, floor);
    assert!(rig.loader.requests().is_empty());
    assert!(!rig.backend.engine().reticle().state().visible);

    rig.frame(floor(5000.0).with_event(SessionEvent::VisibilityChange(VisibilityState::Visible)));
    // 1 s ran before hiding; stability restarts on return.
    rig.stream(5100.0, 6900.0, 100.0, floor);
    assert!(rig.loader.requests().is_empty());
    rig.frame(floor(7000.0));
    assert_eq!(rig.loader.requests().len(), 1);
}

#[test]
fn every_frame_is_submitted() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);

    rig.frame(SimulatedFrame::at(0.0));
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer).with_hit_fault("hit-test source lost"));
    rig.frame(SimulatedFrame::at(200.0).with_viewer(viewer).with_hit(floor_hit(0.0, -1.5)));
    assert_eq!(rig.scene.graph().frames_submitted(), 3);
    assert!(rig.backend.is_running());

    rig.frame(SimulatedFrame::at(300.0).with_event(SessionEvent::End));
    assert_eq!(rig.scene.graph().frames_submitted(), 4);
    assert!(!rig.backend.is_running());
    assert_eq!(rig.overlay.count(&OverlayCall::RestorePreAr), 1);
}

#[test]
fn session_end_releases_everything() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);

    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(hit).tap());
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer).with_hit(hit));
    assert!(rig.backend.engine().content().is_some());

    rig.backend.end(&mut rig.boundary, EndReason::UserClosed);
    assert_eq!(rig.handle.deleted_anchors(), vec![AnchorId(1)], "released before the session ended");
    assert_eq!(rig.handle.live_anchor_count(), 0);
    assert_eq!(rig.backend.engine().anchor_count(), 0);
    assert!(rig.backend.engine().content().is_none());
    let graph = rig.scene.graph();
    assert!(graph.is_empty());
    assert!(!graph.animation_loop_active());
    assert!(graph.reticle().is_none());
    drop(graph);
    assert_eq!(rig.overlay.count(&OverlayCall::RestorePreAr), 1);

    // Ending twice changes nothing.
    let calls = rig.overlay.calls().len();
    rig.backend.end(&mut rig.boundary, EndReason::UserClosed);
    assert_eq!(rig.overlay.calls().len(), calls);
    assert_eq!(rig.backend.engine().state(), PlacementState::Idle);
}

#[test]
fn reset_clears_once_and_searches_again() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);
    let floor = move |t: f64| SimulatedFrame::at(t).with_viewer(viewer).with_hit(hit);

    rig.frame(floor(0.0).tap());
    rig.frame(floor(100.0));
    assert_eq!(rig.backend.engine().state(), PlacementState::Placed);

    rig.reset();
    assert_eq!(rig.backend.engine().state(), PlacementState::Searching);
    assert!(rig.backend.engine().content().is_none());
    assert!(rig.scene.graph().content_nodes().is_empty());
    assert_eq!(rig.handle.deleted_anchors().len(), 1);

    let calls = rig.overlay.calls().len();
    rig.reset();
    assert_eq!(rig.overlay.calls().len(), calls);
    assert_eq!(rig.handle.deleted_anchors().len(), 1);

    // Timers restart from the next frame.
    rig.stream(200.0, 3100.0, 100.0, floor);
    assert_eq!(rig.loader.requests().len(), 1);
    rig.frame(floor(3200.0));
    assert_eq!(rig.loader.requests().len(), 2);
}

#[test]
fn reset_discards_in_flight_load() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_down(EYE);
    let hit = floor_hit(0.0, -1.5);

    rig.loader.hold(true);
    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(hit).tap());
    assert!(rig.backend.engine().is_loading());

    rig.reset();
    rig.loader.hold(false);
    rig.frame(SimulatedFrame::at(100.0).with_viewer(viewer).with_hit(hit));
    assert!(rig.backend.engine().content().is_none());
    assert!(rig.scene.graph().content_nodes().is_empty());
    assert_eq!(rig.handle.live_anchor_count(), 0);
}

#[test]
fn debug_toggle_shows_reticle() {
    let mut rig = WorldRig::started(SimulatedDevice::default());
    let viewer = looking_ahead(EYE);
    let hit = wall_hit(Vec3::new(0.0, 1.5, -2.0));

    rig.backend.toggle_debug(&mut rig.boundary);
    rig.frame(SimulatedFrame::at(0.0).with_viewer(viewer).with_hit(hit));
    let reticle = rig.scene.graph().reticle().expect("debug reticle drawn");
    assert_eq!(reticle.pose, hit);

    rig.backend.toggle_debug(&mut rig.boundary);
    assert!(rig.scene.graph().reticle().is_none());
}
