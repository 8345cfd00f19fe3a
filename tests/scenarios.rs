use std::f64::consts::TAU;

use circoslook::data::{DataRequest, MemoryDataManager, QueuedDataManager, RequestQueue, Resolver};
use circoslook::layout::{allocate_bands, RadialBand};
use circoslook::render::{TrackRenderer, CHORD_WIDTH};
use circoslook::scene::SceneNode;
use circoslook::{
    ChromData, CircosError, DataBounds, DataManager, DataPoint, Genome, RenderState, TrackConfig,
    TrackKind, ViewTransform, Visualization, VizConfig,
};

const EPS: f64 = 1e-9;

fn genome() -> Genome {
    Genome::from_lengths([("chr1", 100), ("chr2", 50)]).unwrap()
}

fn viz_with_gap(gap: f64) -> Visualization {
    let config = VizConfig {
        total_gap: gap,
        ..VizConfig::default()
    };
    Visualization::new(genome(), config).unwrap()
}

fn values() -> Box<dyn DataManager> {
    Box::new(MemoryDataManager::from_values(&[
        vec![1.0, 2.0, 3.0],
        vec![4.0, 5.0],
    ]))
}

fn band(inner_radius: f64, outer_radius: f64) -> RadialBand {
    RadialBand {
        inner_radius,
        outer_radius,
    }
}

#[test]
fn test_single_track_end_to_end() {
    let mut viz = viz_with_gap(0.1);
    let id = viz
        .add_track("cov", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    assert!(viz.run_until_settled(10).unwrap());

    assert_eq!(viz.render_state(id), Some(RenderState::DataRendered));
    assert_eq!(viz.data_bounds(id), Some(DataBounds { min: 1.0, max: 5.0 }));
    assert_eq!(viz.bands().tracks.len(), 1);

    let spans: f64 = viz.sectors().iter().map(|s| s.span()).sum();
    assert!((spans + TAU * 0.1 - TAU).abs() < EPS);
    // Every sector gives up the same gap, the rest is shared by length.
    let gap = TAU * 0.1 / 2.0;
    let chr1 = &viz.sectors()[0];
    let chr2 = &viz.sectors()[1];
    assert!(((chr1.span() + gap) / (chr2.span() + gap) - 2.0).abs() < EPS);

    viz.remove_track(id).unwrap();
    assert!(viz.bands().tracks.is_empty());
    assert_eq!(viz.bands().label, band(440.0, 460.0));
}

#[test]
fn test_second_track_pushes_first_inward() {
    let mut viz = viz_with_gap(0.1);
    let first = viz
        .add_track("a", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    assert_eq!(viz.band_of(first), Some(band(380.0, 440.0)));
    let sectors = viz.sectors().to_vec();

    let second = viz
        .add_track("b", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    assert_eq!(viz.band_of(first), Some(band(315.0, 375.0)));
    assert_eq!(viz.band_of(second), Some(band(380.0, 440.0)));
    assert_eq!(viz.sectors(), sectors.as_slice());
}

#[test]
fn test_removal_matches_fresh_allocation() {
    let mut viz = viz_with_gap(0.4);
    let ids: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            viz.add_track(*name, TrackKind::Quantitative, TrackConfig::new(), values())
                .unwrap()
        })
        .collect();
    viz.run_until_settled(10).unwrap();

    viz.remove_track(ids[1]).unwrap();
    let config = viz.config().clone();
    let expected = allocate_bands(
        2,
        config.track_height,
        config.track_gap,
        config.drawing_radius(),
        config.label_band_height,
    )
    .unwrap();
    assert_eq!(viz.bands(), &expected);
    assert_eq!(viz.band_of(ids[0]), Some(expected.tracks[0]));
    assert_eq!(viz.band_of(ids[2]), Some(expected.tracks[1]));
    assert_eq!(viz.track_ids(), vec![ids[0], ids[2]]);
}

#[test]
fn test_chord_ends_sit_on_positions() {
    let mut viz = viz_with_gap(0.1);
    viz.add_track("cov", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    let links = MemoryDataManager::new(vec![
        ChromData {
            data: vec![DataPoint::link(10, "chr2", 25)],
        },
        ChromData::default(),
    ]);
    let id = viz
        .add_track("links", TrackKind::Chord, TrackConfig::new(), Box::new(links))
        .unwrap();
    assert!(viz.run_until_settled(10).unwrap());
    assert_eq!(viz.render_state(id), Some(RenderState::DataRendered));

    let scene = viz.scene();
    let mut chords = Vec::new();
    scene.walk(&mut |node| {
        if let SceneNode::Chord { geom, .. } = node {
            chords.push(*geom);
        }
    });
    assert_eq!(chords.len(), 1);
    let chord = chords[0];
    let source = viz.sectors()[0].angle_of(10);
    let target = viz.sectors()[1].angle_of(25);
    assert!((chord.source.0 - source).abs() < EPS);
    assert!((chord.source.1 - source - CHORD_WIDTH).abs() < EPS);
    assert!((chord.target.0 - target).abs() < EPS);
    assert_eq!(chord.radius, 380.0);
}

#[test]
fn test_failed_source_does_not_affect_other_tracks() {
    let mut viz = viz_with_gap(0.1);
    let (queued, requests) = QueuedDataManager::new(false);
    let broken = viz
        .add_track("broken", TrackKind::Quantitative, TrackConfig::new(), Box::new(queued))
        .unwrap();
    let healthy = viz
        .add_track("healthy", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();

    viz.pump().unwrap();
    assert_eq!(viz.render_state(broken), Some(RenderState::AwaitingData));
    assert_eq!(viz.render_state(healthy), Some(RenderState::DataRendered));

    // Dropping the resolvers fails the outstanding fetch.
    assert_eq!(requests.len(), 1);
    drop(requests.drain());
    assert!(viz.run_until_settled(10).unwrap());

    let state = viz.render_state(broken).unwrap();
    assert!(state.is_failed());
    assert_eq!(
        state,
        RenderState::Failed(CircosError::RequestDropped.to_string())
    );
    assert_eq!(viz.render_state(healthy), Some(RenderState::DataRendered));
    assert_eq!(
        viz.data_bounds(healthy),
        Some(DataBounds { min: 1.0, max: 5.0 })
    );
}

#[test]
fn test_zoom_refines_through_controller() {
    let mut viz = viz_with_gap(0.1);
    let fine: Vec<DataPoint> = (0..10).map(|i| DataPoint::value(i * 10, i as f64)).collect();
    let source = MemoryDataManager::from_values(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0]])
        .with_tier("chr1", 2.0, fine.clone());
    let id = viz
        .add_track("cov", TrackKind::Quantitative, TrackConfig::new(), Box::new(source))
        .unwrap();
    assert!(viz.run_until_settled(10).unwrap());

    // Centered 2x zoom keeps both chromosomes on screen; only chr1 has detail.
    let issued = viz.zoom(ViewTransform::new(2.0, -500.0, -500.0));
    assert_eq!(issued, 1);
    assert!(viz.run_until_settled(10).unwrap());

    let Some(TrackRenderer::Quantitative(renderer)) = viz.renderer(id) else {
        panic!("expected a quantitative renderer");
    };
    assert_eq!(renderer.segment_data(0), Some(fine.as_slice()));
    assert_eq!(renderer.segment_data(1).map(<[DataPoint]>::len), Some(2));
    assert_eq!(viz.render_state(id), Some(RenderState::DataRendered));

    // Zooming back out issues nothing.
    assert_eq!(viz.zoom(ViewTransform::identity()), 0);
}

#[test]
fn test_scene_has_one_group_per_ring() {
    let mut viz = viz_with_gap(0.1);
    viz.add_track("cov", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    viz.add_track(
        "links",
        TrackKind::Chord,
        TrackConfig::new(),
        Box::new(MemoryDataManager::new(vec![ChromData::default(); 2])),
    )
    .unwrap();
    viz.run_until_settled(10).unwrap();

    let scene = viz.scene();
    assert_eq!(scene.children().len(), 3);
    assert!(scene.find_group("label-track").is_some());
    assert!(scene.find_group("quantitative-track").is_some());
    assert!(scene.find_group("chord-track").is_some());
    assert_eq!(
        scene.count(|n| matches!(n, SceneNode::RadialArea { .. })),
        2
    );
    assert_eq!(
        scene.count(|n| matches!(n, SceneNode::TextOnArc { .. })),
        2
    );
}

#[test]
fn test_layout_animates_between_bands() {
    let mut viz = viz_with_gap(0.1);
    let first = viz
        .add_track("a", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    viz.run_until_settled(10).unwrap();
    viz.add_track("b", TrackKind::Quantitative, TrackConfig::new(), values())
        .unwrap();
    viz.run_until_settled(10).unwrap();

    let inner_edge = |scene: &SceneNode| {
        let group = scene.find_named("a").unwrap();
        let mut radius = None;
        group.walk(&mut |node| {
            if let (None, SceneNode::ArcSector { geom, .. }) = (radius, node) {
                radius = Some(geom.inner_radius);
            }
        });
        radius.unwrap()
    };

    let duration = viz.config().transition_ms as f64;
    assert_eq!(inner_edge(&viz.scene_at(0.0)), 380.0);
    let mid = inner_edge(&viz.scene_at(duration / 2.0));
    assert!(mid < 380.0 && mid > 315.0);
    viz.advance_time(duration);
    assert_eq!(inner_edge(&viz.scene()), 315.0);
    assert_eq!(viz.band_of(first), Some(band(315.0, 375.0)));
}

/// Answer the queued readiness and genome-wide requests; refinements are
/// handed back to the caller in issue order.
fn answer(queue: &RequestQueue, values: &[Vec<f64>]) -> Vec<(f64, Resolver<Vec<DataPoint>>)> {
    let mut refinements = Vec::new();
    for request in queue.drain() {
        match request {
            DataRequest::Ready(r) => r.resolve(true),
            DataRequest::GenomeWide(r) => {
                r.resolve(values.iter().map(|v| ChromData::from_values(v)).collect())
            }
            DataRequest::Refine { scale, resolver, .. } => refinements.push((scale, resolver)),
        }
    }
    refinements
}

#[test]
fn test_out_of_order_refinements_last_arrival_wins() {
    let mut viz = viz_with_gap(0.1);
    let (source, queue) = QueuedDataManager::new(true);
    let id = viz
        .add_track("cov", TrackKind::Quantitative, TrackConfig::new(), Box::new(source))
        .unwrap();
    let coarse = vec![vec![1.0, 2.0], vec![3.0]];
    answer(&queue, &coarse);
    viz.pump().unwrap();
    answer(&queue, &coarse);
    assert!(viz.run_until_settled(10).unwrap());
    assert_eq!(viz.render_state(id), Some(RenderState::DataRendered));

    // Both zooms keep a point of chr1's ring (3 o'clock) fixed on screen.
    let focus = (910.0, 500.0);
    assert_eq!(viz.zoom(ViewTransform::identity().zoomed_at(2.0, focus)), 1);
    assert_eq!(viz.zoom(ViewTransform::identity().zoomed_at(4.0, focus)), 1);
    let mut refinements = answer(&queue, &[]);
    assert_eq!(refinements.len(), 2);

    let four_x: Vec<DataPoint> = (0..4).map(|i| DataPoint::value(i * 25, 4.0)).collect();
    let two_x: Vec<DataPoint> = (0..2).map(|i| DataPoint::value(i * 50, 2.0)).collect();

    // The finer answer arrives first and is shown...
    let (scale, resolver) = refinements.pop().unwrap();
    assert_eq!(scale, 4.0);
    resolver.resolve(four_x.clone());
    viz.pump().unwrap();
    let Some(TrackRenderer::Quantitative(renderer)) = viz.renderer(id) else {
        panic!("expected a quantitative renderer");
    };
    assert_eq!(renderer.segment_data(0), Some(four_x.as_slice()));

    // ...until the older, coarser one lands and replaces it.
    let (scale, resolver) = refinements.pop().unwrap();
    assert_eq!(scale, 2.0);
    resolver.resolve(two_x.clone());
    assert!(viz.run_until_settled(10).unwrap());
    let Some(TrackRenderer::Quantitative(renderer)) = viz.renderer(id) else {
        panic!("expected a quantitative renderer");
    };
    assert_eq!(renderer.segment_data(0), Some(two_x.as_slice()));
    assert_eq!(renderer.segment_data(1).map(<[DataPoint]>::len), Some(1));
}

#[test]
fn test_silent_source_becomes_unavailable_after_timeout() {
    let mut viz = viz_with_gap(0.1);
    let (source, _requests) = QueuedDataManager::new(false);
    let id = viz
        .add_track("silent", TrackKind::Quantitative, TrackConfig::new(), Box::new(source))
        .unwrap();

    assert!(!viz.run_until_settled(5).unwrap());
    let timeout = viz.config().fetch_timeout_ms as f64;
    viz.advance_time(timeout - 1.0);
    viz.pump().unwrap();
    assert_eq!(viz.render_state(id), Some(RenderState::AwaitingData));

    viz.advance_time(1.0);
    viz.pump().unwrap();
    let expected = CircosError::DataUnavailable {
        track: "silent".to_string(),
        reason: format!("no response within {} ms", timeout),
    };
    assert_eq!(viz.render_state(id), Some(RenderState::Failed(expected.to_string())));
    assert!(!viz.has_outstanding());
}
