//! Integration tests for background rendering jobs.
//!
//! These tests drive `MapHandle` through a `JobScheduler` and check:
//! - callback delivery through the dispatcher, exactly once per job
//! - the map stays pinned until its completion has run
//! - job errors arrive as results, argument errors arrive immediately
//! - a queued job renders the map as it was at submission
//!
//! Run with: `cargo test --test async_jobs`

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use mapgrid::datasource::{AttributeDescriptor, AttributeKind, Feature, MemoryDatasource};
use mapgrid::executor::{CompletionDispatcher, JobScheduler, JobState, SchedulerConfig};
use mapgrid::{
    Coord, EncodedGrid, Envelope, ErrorKind, Geometry, GridOptions, Layer, Map, MapHandle,
    MapResult,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn scheduler(workers: usize) -> (JobScheduler, CompletionDispatcher) {
    JobScheduler::new(
        SchedulerConfig::default().with_workers(workers),
        Handle::current(),
    )
}

fn points_map() -> MapHandle {
    let ds = MemoryDatasource::new("pts")
        .with_attribute(AttributeDescriptor::new("name", AttributeKind::String))
        .with_feature(
            Feature::new(1)
                .with_geometry(Geometry::Point(Coord::new(-50.0, 0.0)))
                .with_property("name", "west"),
        )
        .with_feature(
            Feature::new(2)
                .with_geometry(Geometry::Point(Coord::new(50.0, 0.0)))
                .with_property("name", "east"),
        );
    let mut map = Map::new(128, 128);
    map.add_layer(Layer::new("pts").with_datasource(ds));
    map.zoom_to_box(Envelope::new(-100.0, -100.0, 100.0, 100.0));
    MapHandle::new(map)
}

type Slot<T> = Arc<Mutex<Vec<MapResult<T>>>>;

fn slot<T>() -> Slot<T> {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_grid_callback_delivered_once() {
    let (sched, mut dispatcher) = scheduler(2);
    let map = points_map();
    let results: Slot<EncodedGrid> = slot();

    let sink = Arc::clone(&results);
    let ticket = map
        .render_grid_with(&sched, "pts", GridOptions::default(), move |r| {
            sink.lock().push(r)
        })
        .unwrap();

    assert_eq!(dispatcher.run().await, 1);
    assert_eq!(dispatcher.run().await, 0);

    let results = results.lock();
    assert_eq!(results.len(), 1);
    let grid = results[0].as_ref().unwrap();
    assert_eq!(grid.keys, vec!["", "1", "2"]);
    assert_eq!(ticket.state(), JobState::CompletedOk);
}

#[tokio::test]
async fn test_map_pinned_until_completion_runs() {
    let (sched, mut dispatcher) = scheduler(1);
    let map = points_map();
    let observed = Arc::new(Mutex::new(0usize));

    let probe = map.clone();
    let seen = Arc::clone(&observed);
    map.render_grid_with(&sched, 0usize, GridOptions::default(), move |_| {
        // `map`, `probe` and the job's pin
        *seen.lock() = probe.strong_count();
    })
    .unwrap();

    assert!(map.strong_count() >= 3);
    dispatcher.run().await;

    assert_eq!(*observed.lock(), 3);
    // the handler (and its probe clone) and the pin are gone
    assert_eq!(map.strong_count(), 1);
}

#[tokio::test]
async fn test_job_errors_arrive_through_callback() {
    let (sched, mut dispatcher) = scheduler(2);
    let map = points_map();
    let results: Slot<EncodedGrid> = slot();

    let sink = Arc::clone(&results);
    let missing = map
        .render_grid_with(&sched, "nowhere", GridOptions::default(), move |r| {
            sink.lock().push(r)
        })
        .unwrap();
    let sink = Arc::clone(&results);
    map.render_grid_with(
        &sched,
        "pts",
        GridOptions::default().with_join_field("nope"),
        move |r| sink.lock().push(r),
    )
    .unwrap();

    assert_eq!(dispatcher.run().await, 2);
    let results = results.lock();
    assert!(results.iter().all(|r| r.is_err()));
    let kinds: Vec<ErrorKind> = results
        .iter()
        .map(|r| r.as_ref().unwrap_err().kind())
        .collect();
    assert!(kinds.contains(&ErrorKind::Resolution));
    assert!(kinds.contains(&ErrorKind::Configuration));
    assert_eq!(missing.state(), JobState::CompletedError);
}

#[tokio::test]
async fn test_projection_error_arrives_through_callback() {
    let (sched, mut dispatcher) = scheduler(1);
    let ds = MemoryDatasource::new("lcc")
        .with_feature(Feature::new(1).with_geometry(Geometry::Point(Coord::new(0.0, 0.0))));
    let mut map = Map::new(64, 64);
    map.add_layer(
        Layer::new("lcc")
            .with_srs("+proj=lcc +lat_1=33 +lat_2=45")
            .with_datasource(ds),
    );
    map.zoom_to_box(Envelope::new(-10.0, -10.0, 10.0, 10.0));
    let map = MapHandle::new(map);
    let results: Slot<EncodedGrid> = slot();

    let sink = Arc::clone(&results);
    let ticket = map
        .render_grid_with(&sched, "lcc", GridOptions::default(), move |r| {
            sink.lock().push(r)
        })
        .unwrap();

    assert_eq!(dispatcher.run().await, 1);
    let results = results.lock();
    assert_eq!(results.len(), 1);
    let err = results[0].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Projection);
    assert_eq!(ticket.state(), JobState::CompletedError);
}

#[tokio::test]
async fn test_argument_errors_schedule_nothing() {
    let (sched, dispatcher) = scheduler(1);
    let map = points_map();

    let err = map
        .render_grid_with(
            &sched,
            "pts",
            GridOptions::default().with_join_field(""),
            |_| panic!("must not run"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = map
        .render_image(&sched, Envelope::new(0.0, 0.0, f64::INFINITY, 1.0), "png")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = map
        .render_image(&sched, Envelope::from_corners(5.0, 5.0, -5.0, -5.0), "png")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    assert_eq!(dispatcher.in_flight(), 0);
    assert_eq!(map.strong_count(), 1);
}

#[tokio::test]
async fn test_image_job_via_future_and_callback() {
    let (sched, mut dispatcher) = scheduler(2);
    let map = points_map();
    let extent = Envelope::new(-80.0, -80.0, 80.0, 80.0);

    let png = map.render_image(&sched, extent, "png").unwrap().await.unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (128, 128));

    let results: Slot<Vec<u8>> = slot();
    let sink = Arc::clone(&results);
    map.render_image_with(&sched, extent, "jpeg70", move |r| sink.lock().push(r))
        .unwrap();
    dispatcher.run().await;
    let bytes = results.lock().pop().unwrap().unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_queued_job_sees_submission_snapshot() {
    let (sched, _dispatcher) = scheduler(1);
    let map = points_map();

    let job = map
        .render_grid(&sched, "pts", GridOptions::default())
        .unwrap();
    // edits after submission must not reach the job
    map.write().clear();

    let grid = job.await.unwrap();
    assert_eq!(grid.keys, vec!["", "1", "2"]);
    assert_eq!(map.read().layer_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_many_jobs_each_complete_once() {
    let (sched, mut dispatcher) = scheduler(3);
    let map = points_map();
    let results: Slot<EncodedGrid> = slot();

    for resolution in 1..=12 {
        let sink = Arc::clone(&results);
        map.render_grid_with(
            &sched,
            "pts",
            GridOptions::default().with_resolution(resolution),
            move |r| sink.lock().push(r),
        )
        .unwrap();
    }

    assert_eq!(dispatcher.run().await, 12);
    let results = results.lock();
    assert_eq!(results.len(), 12);
    let mut heights: Vec<usize> = results
        .iter()
        .map(|r| r.as_ref().unwrap().grid.len())
        .collect();
    heights.sort_unstable();
    let mut expected: Vec<usize> = (1..=12).map(|s| 128 / s).collect();
    expected.sort_unstable();
    assert_eq!(heights, expected);
    assert_eq!(map.strong_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_future_handles_resolve_independently() {
    let (sched, dispatcher) = scheduler(2);
    let map = points_map();

    let jobs: Vec<_> = [2u32, 4, 8]
        .into_iter()
        .map(|r| {
            map.render_grid(&sched, "pts", GridOptions::default().with_resolution(r))
                .unwrap()
        })
        .collect();
    let ids: Vec<u64> = jobs.iter().map(|j| j.id().as_u64()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let grids = futures::future::join_all(jobs).await;
    let widths: Vec<usize> = grids
        .into_iter()
        .map(|g| g.unwrap().grid[0].chars().count())
        .collect();
    assert_eq!(widths, vec![64, 32, 16]);
    // future-based jobs never pass through the dispatcher
    assert_eq!(dispatcher.in_flight(), 0);
}
