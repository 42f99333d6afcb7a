//! Integration tests: full tile lifecycles through the public API, against
//! both the in-memory display and a recording display double.

use std::cell::RefCell;
use std::rc::Rc;

use tix_bitmap::{
    BitmapCache, BitmapCommand, CommandDispatcher, Display, MemoryDisplay, PixelFormat, Rect,
    SurfaceId, Target, TileError,
};

// ── Helpers ──────────────────────────────────────────────────────

/// 10x10 opaque tile whose pixels are all distinct.
fn gradient_10x10() -> Vec<u8> {
    let mut data = Vec::with_capacity(400);
    for y in 0..10u8 {
        for x in 0..10u8 {
            data.extend_from_slice(&[x * 20, y * 20, x + y, 0xFF]);
        }
    }
    data
}

fn canvas_region(cache: &BitmapCache<MemoryDisplay>, x: u32, y: u32) -> Vec<u8> {
    cache.display().canvas().region(x, y, 10, 10)
}

/// Display double that records every call and can refuse allocations.
///
/// The call log is shared so it can be inspected after the cache (and
/// with it the display) has been dropped.
struct RecordingDisplay {
    inner: MemoryDisplay,
    refuse_alloc: bool,
    log: Rc<RefCell<Vec<String>>>,
}

impl RecordingDisplay {
    fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let display = Self {
            inner: MemoryDisplay::new(64, 64),
            refuse_alloc: false,
            log: Rc::clone(&log),
        };
        (display, log)
    }

    fn record(&self, call: String) {
        self.log.borrow_mut().push(call);
    }
}

impl Display for RecordingDisplay {
    fn alloc_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, TileError> {
        self.record(format!("alloc {width}x{height}"));
        if self.refuse_alloc {
            return Err(TileError::SurfaceAllocation {
                width,
                height,
                reason: "refused".into(),
            });
        }
        self.inner.alloc_surface(width, height)
    }

    fn free_surface(&mut self, id: SurfaceId) -> Result<(), TileError> {
        self.record("free".into());
        self.inner.free_surface(id)
    }

    fn draw(
        &mut self,
        target: Target,
        pixels: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), TileError> {
        let kind = if target == Target::Canvas { "canvas" } else { "surface" };
        self.record(format!("draw {kind} {x},{y} {width}x{height} stride {stride}"));
        self.inner.draw(target, pixels, x, y, width, height, stride)
    }

    fn copy(
        &mut self,
        src: SurfaceId,
        sx: u32,
        sy: u32,
        width: u32,
        height: u32,
        dst: Target,
        dx: u32,
        dy: u32,
    ) -> Result<(), TileError> {
        self.record(format!("copy {width}x{height} -> {dx},{dy}"));
        self.inner.copy(src, sx, sy, width, height, dst, dx, dy)
    }
}

// ── Lifecycle scenario ───────────────────────────────────────────

#[test]
fn test_paint_twice_then_destroy() {
    let mut cache = BitmapCache::new(MemoryDisplay::new(32, 32));
    let pixels = gradient_10x10();
    let tile = cache
        .create_tile(10, 10, Some(pixels.clone()), PixelFormat::Xrgb32)
        .unwrap();

    // First paint: drawn directly, nothing cached.
    cache
        .composite_tile(tile, Rect::from_size(10, 10), 0, 0)
        .unwrap();
    assert!(cache.tile(tile).unwrap().surface().is_none());
    assert_eq!(cache.display().live_surfaces(), 0);
    assert_eq!(canvas_region(&cache, 0, 0), pixels);

    // Second paint: materialized, then copied from the surface.
    cache
        .composite_tile(tile, Rect::from_size(10, 10), 5, 5)
        .unwrap();
    assert!(cache.tile(tile).unwrap().surface().is_some());
    assert_eq!(cache.display().live_surfaces(), 1);
    assert_eq!(canvas_region(&cache, 5, 5), pixels);

    cache.destroy_tile(tile);
    assert_eq!(cache.display().live_surfaces(), 0);
    assert_eq!(cache.display().freed(), 1);
}

#[test]
fn test_cached_and_direct_draws_match() {
    let pixels = gradient_10x10();

    let mut direct = BitmapCache::new(MemoryDisplay::new(32, 32));
    let d = direct
        .create_tile(10, 10, Some(pixels.clone()), PixelFormat::Xrgb32)
        .unwrap();
    direct.composite_tile(d, Rect::new(0, 0, 6, 3), 8, 8).unwrap();

    let mut cached = BitmapCache::new(MemoryDisplay::new(32, 32));
    let c = cached
        .create_tile(10, 10, Some(pixels), PixelFormat::Xrgb32)
        .unwrap();
    cached.select_target(false, Some(c)).unwrap();
    cached.select_target(true, None).unwrap();
    cached.composite_tile(c, Rect::new(0, 0, 6, 3), 8, 8).unwrap();
    assert_eq!(cached.stats().cached_draws, 1);

    assert_eq!(
        direct.display().canvas().as_bytes(),
        cached.display().canvas().as_bytes()
    );
}

#[test]
fn test_normalized_tile_survives_promotion() {
    // 2x1 BGR24 → canonical, then painted from a surface.
    let mut cache = BitmapCache::new(MemoryDisplay::new(4, 4));
    let tile = cache
        .create_tile(2, 1, Some(vec![1, 2, 3, 4, 5, 6]), PixelFormat::Bgr24)
        .unwrap();
    cache.composite_tile(tile, Rect::from_size(2, 1), 0, 0).unwrap();
    cache.composite_tile(tile, Rect::from_size(2, 1), 0, 1).unwrap();

    let canvas = cache.display().canvas();
    assert_eq!(canvas.pixel(0, 1), Some([1, 2, 3, 0xFF]));
    assert_eq!(canvas.pixel(1, 1), Some([4, 5, 6, 0xFF]));
    assert_eq!(canvas.region(0, 0, 2, 1), canvas.region(0, 1, 2, 1));
}

// ── Collaborator call sequence ───────────────────────────────────

#[test]
fn test_display_call_sequence() {
    let (display, log) = RecordingDisplay::new();
    let mut cache = BitmapCache::new(display);
    let tile = cache
        .create_tile(4, 2, Some(vec![0; 32]), PixelFormat::Xrgb32)
        .unwrap();

    cache.composite_tile(tile, Rect::new(0, 0, 1, 1), 3, 3).unwrap();
    cache.composite_tile(tile, Rect::new(0, 0, 1, 1), 6, 6).unwrap();
    cache.destroy_tile(tile);
    cache.destroy_tile(tile);

    assert_eq!(
        *log.borrow(),
        vec![
            "draw canvas 3,3 2x2 stride 16",
            "alloc 4x2",
            "draw surface 0,0 4x2 stride 16",
            "copy 2x2 -> 6,6",
            "free",
        ]
    );
}

#[test]
fn test_refused_allocation_keeps_drawing_directly() {
    let (mut display, log) = RecordingDisplay::new();
    display.refuse_alloc = true;
    let mut cache = BitmapCache::new(display);
    let tile = cache
        .create_tile(1, 1, Some(vec![9, 9, 9, 9]), PixelFormat::Xrgb32)
        .unwrap();

    for i in 0..3 {
        cache.composite_tile(tile, Rect::from_size(1, 1), i, 0).unwrap();
    }

    // Every paint after the first re-evaluates the gate; none succeed.
    let allocs = log
        .borrow()
        .iter()
        .filter(|c| c.starts_with("alloc"))
        .count();
    assert_eq!(allocs, 2);
    assert_eq!(cache.stats().direct_draws, 3);
    assert!(!cache.tile(tile).unwrap().is_promoted());
}

#[test]
fn test_dropping_cache_frees_remaining_surfaces() {
    let (display, log) = RecordingDisplay::new();
    let mut cache = BitmapCache::new(display);
    let a = cache.create_tile(2, 2, None, PixelFormat::Xrgb32).unwrap();
    let b = cache.create_tile(2, 2, None, PixelFormat::Xrgb32).unwrap();
    let _unpromoted = cache.create_tile(2, 2, None, PixelFormat::Xrgb32).unwrap();
    cache.select_target(false, Some(a)).unwrap();
    cache.select_target(false, Some(b)).unwrap();
    cache.destroy_tile(a);

    drop(cache);

    let frees = log.borrow().iter().filter(|c| *c == "free").count();
    assert_eq!(frees, 2);
}

// ── Target redirection ───────────────────────────────────────────

#[test]
fn test_null_target_is_logged_noop() {
    let mut cache = BitmapCache::new(MemoryDisplay::new(8, 8));
    let tile = cache.create_tile(2, 2, None, PixelFormat::Xrgb32).unwrap();
    cache.select_target(false, Some(tile)).unwrap();
    let before = cache.active_target();

    assert!(cache.select_target(false, None).is_ok());
    assert_eq!(cache.active_target(), before);
}

#[test]
fn test_dispatcher_replays_session() {
    let commands: Vec<BitmapCommand> = [
        r#"{"new":{"id":1,"width":2,"height":2,"format":"rgb24","data":[255,0,0,255,0,0,255,0,0,255,0,0]}}"#,
        r#"{"new":{"id":2,"width":4,"height":4,"format":"xrgb32","data":null}}"#,
        r#"{"set_surface":{"primary":false,"id":2}}"#,
        r#"{"paint":{"id":1,"bounds":{"left":0,"top":0,"right":1,"bottom":1},"dest_x":1,"dest_y":1}}"#,
        r#"{"set_surface":{"primary":true,"id":null}}"#,
        r#"{"paint":{"id":2,"bounds":{"left":0,"top":0,"right":3,"bottom":3},"dest_x":0,"dest_y":0}}"#,
        r#"{"set_surface":{"primary":false,"id":null}}"#,
        r#"{"free":{"id":1}}"#,
        r#"{"free":{"id":2}}"#,
        r#"{"free":{"id":2}}"#,
    ]
    .iter()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();

    let mut dispatcher = CommandDispatcher::new(BitmapCache::new(MemoryDisplay::new(8, 8)));
    dispatcher.dispatch_all(commands);

    let cache = dispatcher.cache();
    let red = Some([0, 0, 0xFF, 0xFF]);
    assert_eq!(cache.display().canvas().pixel(1, 1), red);
    assert_eq!(cache.display().canvas().pixel(2, 2), red);
    assert_eq!(cache.display().canvas().pixel(0, 0), Some([0; 4]));
    assert_eq!(cache.display().live_surfaces(), 0);
    assert_eq!(cache.display().freed(), 1);
    assert_eq!(cache.stats().tiles_destroyed, 2);
    assert_eq!(dispatcher.rejected(), 0);
}
