//! End-to-end builds with the pure-Rust engine on a real PNG.

use iiif_tiler::{Manifest, NativeEngine, PyramidBuilder, PyramidConfig};

use super::test_utils::{list_files, region_tiles, write_gradient_png};

/// Width and height encoded in a tile path's region segment.
fn region_of(tile: &str) -> (u32, u32, u32, u32) {
    let region = tile.split('/').next().unwrap();
    let parts: Vec<u32> = region.split(',').map(|p| p.parse().unwrap()).collect();
    (parts[0], parts[1], parts[2], parts[3])
}

/// Width from a tile path's `w,` size segment.
fn size_of(tile: &str) -> u32 {
    let size = tile.split('/').nth(1).unwrap();
    size.trim_end_matches(',').parse().unwrap()
}

#[tokio::test]
async fn test_native_build_600x520() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("gradient.png");
    let out = dir.path().join("gradient");
    write_gradient_png(&source, 600, 520);

    let builder = PyramidBuilder::new(NativeEngine::new(), PyramidConfig::default());
    let manifest = builder
        .build(&source, &out, "https://example.com/iiif/gradient")
        .await
        .unwrap();

    assert_eq!((manifest.width, manifest.height), (600, 520));
    assert_eq!(manifest.scale_factors(), &[1, 2]);

    // 3x3 grid at sf 1, 2x2 grid at sf 2
    let tiles = region_tiles(&out);
    assert_eq!(tiles.len(), 13);

    for tile in &tiles {
        let (_, _, w, h) = region_of(tile);
        let img = image::open(out.join(tile)).unwrap();

        // sf 1 tiles keep their region width; sf 2 tiles halve it
        let sf = if w > 256 || h > 256 || size_of(tile) != w { 2 } else { 1 };
        let expected_w = if w == 256 * sf { 256 } else { w.div_ceil(sf) };
        let expected_h = if h == 256 * sf { 256 } else { h.div_ceil(sf) };

        assert_eq!(img.width(), size_of(tile), "{}", tile);
        assert_eq!((img.width(), img.height()), (expected_w, expected_h), "{}", tile);
    }

    let full = image::open(out.join("full/512,/0/default.jpg")).unwrap();
    assert_eq!((full.width(), full.height()), (512, 444));
    assert!(!out.join("full/1024,/0/default.jpg").exists());

    let written =
        Manifest::from_json(&std::fs::read_to_string(out.join("info.json")).unwrap()).unwrap();
    assert_eq!(written, manifest);
}

#[tokio::test]
async fn test_native_sf2_edge_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("gradient.png");
    let out = dir.path().join("gradient");
    write_gradient_png(&source, 600, 520);

    let builder = PyramidBuilder::new(NativeEngine::new(), PyramidConfig::default());
    builder
        .build(&source, &out, "https://example.com/iiif/gradient")
        .await
        .unwrap();

    let cases = [
        ("0,0,512,512/256,/0/default.jpg", (256, 256)),
        ("512,0,88,512/44,/0/default.jpg", (44, 256)),
        ("0,512,512,8/256,/0/default.jpg", (256, 4)),
        ("512,512,88,8/44,/0/default.jpg", (44, 4)),
        ("512,512,88,8/88,/0/default.jpg", (88, 8)),
    ];
    for (tile, (w, h)) in cases {
        let img = image::open(out.join(tile)).unwrap();
        assert_eq!((img.width(), img.height()), (w, h), "{}", tile);
    }
}

#[tokio::test]
async fn test_native_scratch_is_cleaned() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let source = dir.path().join("gradient.png");
    write_gradient_png(&source, 600, 520);

    let builder = PyramidBuilder::new(NativeEngine::new(), PyramidConfig::default())
        .with_scratch_dir(scratch.path())
        .with_jobs(2);
    builder
        .build(&source, &dir.path().join("out"), "id")
        .await
        .unwrap();

    assert!(list_files(scratch.path()).is_empty());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_native_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let builder = PyramidBuilder::new(NativeEngine::new(), PyramidConfig::default());

    let result = builder
        .build(&dir.path().join("nope.png"), &dir.path().join("out"), "id")
        .await;

    assert!(matches!(
        result,
        Err(iiif_tiler::PyramidError::ProbeFailed { .. })
    ));
    assert!(!dir.path().join("out").exists());
}
