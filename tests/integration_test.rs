mod common;

use common::{corner_rasters, MemReader, UTM10};
use flate2::read::GzDecoder;
use mosaic_tiler::data_source::{read_inputs, GeoTiffReader, RasterReader};
use mosaic_tiler::errors::MosaicError;
use mosaic_tiler::extent::Extent;
use mosaic_tiler::grid::TileGrid;
use mosaic_tiler::index::{build_tile_index, intersecting_inputs, TileIndex};
use mosaic_tiler::layout::OutputLayout;
use mosaic_tiler::negotiation::{negotiate, ExtentPolicy, Negotiated, ResolutionPolicy, SrsPolicy};
use mosaic_tiler::postprocess::{archive_logs, find_log_files};
use mosaic_tiler::statistics::Stat;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

fn negotiate_union(reader: &MemReader, names: &[&str]) -> Negotiated {
    let inputs = read_inputs(reader, &reader.paths(names)).unwrap();
    negotiate(
        &inputs,
        reader,
        &SrsPolicy::First,
        &ResolutionPolicy::Min,
        &ExtentPolicy::Union,
    )
    .unwrap()
}

fn build_index(reader: &MemReader, names: &[&str], tile_size: f64) -> TileIndex {
    let negotiated = negotiate_union(reader, names);
    let grid = TileGrid::new(&negotiated.params, tile_size).unwrap();
    build_tile_index(&grid, &negotiated.footprints, &negotiated.params).unwrap()
}

#[test]
fn test_tiles_without_inputs_are_dropped() {
    let reader = corner_rasters();
    let index = build_index(&reader, &["a.tif", "b.tif"], 1000.0);

    assert_eq!(index.tiles.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
    assert_eq!(index.tiles[&0].inputs, vec![PathBuf::from("a.tif")]);
    assert_eq!(index.tiles[&3].inputs, vec![PathBuf::from("b.tif")]);
    assert_eq!(index.tiles[&3].extent, Extent::new(1000.0, 0.0, 2000.0, 1000.0));
    assert_eq!(index.tiles[&3].name, "500_1500");
    assert_eq!(index.tile_size, 1000.0);
    assert!(index.records().all(|r| !r.inputs.is_empty()));
}

#[test]
fn test_index_matches_brute_force() {
    let reader = MemReader::new()
        .with_raster("a.tif", UTM10, 0.0, 2000.0, 10.0, 120, 70)
        .with_raster("b.tif", UTM10, 900.0, 1300.0, 10.0, 40, 90)
        .with_raster("c.tif", UTM10, 2500.0, 600.0, 10.0, 30, 30)
        .with_raster("d.tif", UTM10, 150.0, 450.0, 10.0, 200, 20);
    let names = ["a.tif", "b.tif", "c.tif", "d.tif"];
    let negotiated = negotiate_union(&reader, &names);
    let grid = TileGrid::new(&negotiated.params, 500.0).unwrap();
    let index = build_tile_index(&grid, &negotiated.footprints, &negotiated.params).unwrap();

    for tile in grid.iter() {
        let expected: Vec<PathBuf> = negotiated
            .footprints
            .iter()
            .filter(|fp| {
                let b = fp.bounds;
                let t = tile.extent;
                b.xmin <= t.xmax && b.xmax >= t.xmin && b.ymin <= t.ymax && b.ymax >= t.ymin
            })
            .map(|fp| fp.path.clone())
            .collect();
        match index.tiles.get(&tile.number) {
            Some(record) => assert_eq!(record.inputs, expected, "tile {}", tile.number),
            None => assert!(expected.is_empty(), "tile {} was dropped", tile.number),
        }
    }
}

#[test]
fn test_touching_boundaries_intersect() {
    // a fills tile 0 exactly and touches its three neighbours
    let reader = MemReader::new()
        .with_raster("a.tif", UTM10, 0.0, 2000.0, 10.0, 100, 100)
        .with_raster("far.tif", UTM10, 1900.0, 100.0, 10.0, 10, 10);
    let negotiated = negotiate_union(&reader, &["a.tif", "far.tif"]);
    let grid = TileGrid::new(&negotiated.params, 1000.0).unwrap();
    assert_eq!(grid.total_tiles, 4);

    for tile in grid.iter() {
        let inputs = intersecting_inputs(&tile, &negotiated.footprints);
        assert!(
            inputs.contains(&PathBuf::from("a.tif")),
            "tile {} should touch a.tif",
            tile.number
        );
    }
}

#[test]
fn test_no_coverage_with_explicit_extent() {
    let reader = corner_rasters();
    let inputs = read_inputs(&reader, &reader.paths(&["a.tif"])).unwrap();
    let negotiated = negotiate(
        &inputs,
        &reader,
        &SrsPolicy::First,
        &ResolutionPolicy::Min,
        &ExtentPolicy::Explicit(Extent::new(5000.0, 5000.0, 6000.0, 6000.0)),
    )
    .unwrap();
    let grid = TileGrid::new(&negotiated.params, 1000.0).unwrap();
    let result = build_tile_index(&grid, &negotiated.footprints, &negotiated.params);
    assert!(matches!(result, Err(MosaicError::NoCoverage)));
}

#[test]
fn test_index_persistence_and_reuse() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mos_tile_index.json");
    let reader = corner_rasters();

    let (built, reused) =
        TileIndex::load_or_build(&path, || Ok(build_index(&reader, &["a.tif", "b.tif"], 1000.0)))
            .unwrap();
    assert!(!reused);
    assert!(path.exists());

    let (loaded, reused) =
        TileIndex::load_or_build(&path, || panic!("index should have been loaded")).unwrap();
    assert!(reused);
    assert_eq!(loaded, built);

    // The persisted document carries the mosaic parameters next to the tiles
    let json: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
    assert_eq!(json["params"]["srs"]["definition"], UTM10);
    assert_eq!(json["params"]["extent"][2], 1700.0);
    assert!(json["tiles"]["3"]["inputs"].is_array());
}

#[test]
fn test_corrupt_index_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mos_tile_index.json");
    let mut index = build_index(&corner_rasters(), &["a.tif", "b.tif"], 1000.0);

    if let Some(record) = index.tiles.get_mut(&3) {
        record.inputs.clear();
    }
    index.save(&path).unwrap();
    assert!(matches!(
        TileIndex::load(&path),
        Err(MosaicError::CorruptIndex { .. })
    ));

    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(TileIndex::load(&path), Err(MosaicError::JsonError(_))));
}

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

fn write_geotiff(path: &Path, width: u32, height: u32, origin: (f64, f64), res: f64, keys: &[u16]) {
    let mut file = File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(&mut file).unwrap();
    let mut image = tiff
        .new_image::<colortype::Gray32Float>(width, height)
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &[res, res, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(MODEL_TIEPOINT),
            &[0.0, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), keys)
        .unwrap();
    let data = vec![0.0f32; (width * height) as usize];
    image.write_data(&data).unwrap();
}

#[test]
fn test_geotiff_reader_projected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("utm.tif");
    // GTModelType = projected, ProjectedCSType = 32610
    let keys = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32610];
    write_geotiff(&path, 4, 3, (500_000.0, 4_100_000.0), 2.0, &keys);

    let reader = GeoTiffReader::new();
    let info = reader.read_info(&path).unwrap();
    assert_eq!((info.width, info.height), (4, 3));
    assert_eq!(
        info.geotransform,
        [500_000.0, 2.0, 0.0, 4_100_000.0, 0.0, -2.0]
    );
    assert_eq!(info.srs.definition, UTM10);
    assert!(!info.srs.geographic);
    assert_eq!(info.pixel_to_map(4.0, 3.0), (500_008.0, 4_099_994.0));
}

#[test]
fn test_geotiff_reader_pixel_is_point() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("point.tif");
    // As the projected case, plus GTRasterType = PixelIsPoint
    let keys = [1, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 2, 3072, 0, 1, 32610];
    write_geotiff(&path, 4, 3, (500_000.0, 4_100_000.0), 2.0, &keys);

    let info = GeoTiffReader::new().read_info(&path).unwrap();
    assert_eq!(
        info.geotransform,
        [499_999.0, 2.0, 0.0, 4_100_001.0, 0.0, -2.0]
    );
    assert_eq!(info.srs.definition, UTM10);

    // PixelIsArea (1) leaves the tie point on the corner
    let keys = [1, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 32610];
    write_geotiff(&path, 4, 3, (500_000.0, 4_100_000.0), 2.0, &keys);
    let info = GeoTiffReader::new().read_info(&path).unwrap();
    assert_eq!(info.geotransform[0], 500_000.0);
    assert_eq!(info.geotransform[3], 4_100_000.0);
}

#[test]
fn test_geotiff_reader_geographic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("geo.tif");
    // GTModelType = geographic, GeographicType = 4326
    let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
    write_geotiff(&path, 8, 8, (-120.0, 40.0), 0.25, &keys);

    let info = GeoTiffReader::new().read_info(&path).unwrap();
    assert_eq!(info.srs.epsg_code(), Some(4326));
    assert!(info.srs.geographic);
}

#[test]
fn test_geotiff_reader_rejects_plain_tiff() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.tif");
    {
        let mut file = File::create(&path).unwrap();
        let mut tiff = TiffEncoder::new(&mut file).unwrap();
        tiff.write_image::<colortype::Gray8>(2, 2, &[0u8; 4]).unwrap();
    }

    let result = GeoTiffReader::new().read_info(&path);
    assert!(matches!(result, Err(MosaicError::InvalidGeoTiff { .. })));

    // read_inputs reports it and carries on with nothing left
    let result = read_inputs(&GeoTiffReader::new(), &[path]);
    assert!(matches!(result, Err(MosaicError::NoInputs)));
}

#[test]
fn test_log_archive_collects_and_removes_logs() {
    let dir = tempdir().unwrap();
    let layout = OutputLayout::new(dir.path().join("mos").to_str().unwrap());
    let logs = [
        "mos-tile-0-wmean.tif-log-dem_mosaic-0001.txt",
        "mos-tile-3-wmean.tif-log-dem_mosaic-0002.txt",
    ];
    for name in logs {
        fs::write(dir.path().join(name), name).unwrap();
    }
    fs::write(dir.path().join("mos-tile-0-count.tif-log-dem_mosaic-0003.txt"), "").unwrap();
    fs::write(dir.path().join("mos-tile-0-wmean.tif"), "").unwrap();

    let found = find_log_files(&layout, Stat::Wmean).unwrap();
    assert_eq!(found.len(), 2);

    let archive = layout.log_archive(Stat::Wmean);
    archive_logs(&found, &archive).unwrap();
    assert!(found.iter().all(|p| !p.exists()));
    assert!(dir.path().join("mos-tile-0-count.tif-log-dem_mosaic-0003.txt").exists());

    let mut tar = tar::Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
    let mut names: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, logs);
}
