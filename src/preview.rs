//! Отладочное превью мира в PNG
//!
//! Растеризация идёт через [`Partition::locate_from`](crate::partition::Partition::locate_from): подсказкой служит ячейка
//! предыдущего пикселя строки, поэтому спуск обычно занимает пару шагов.
//! Поверх заливки рисуются береговые линии, берега озёр, реки, дороги и поселения.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::error::GenerationError;
use crate::geometry::Point;
use crate::heightmap::{ElevationSource, MAX_HEIGHT, MIN_DEPTH, SEA_LEVEL};
use crate::outline::{coastlines, lake_shores, territory_borders};
use crate::partition::AdjacencyProvider;
use crate::roads::RoadImportance;
use crate::settlement::SettlementRole;
use crate::world::World;

const DEEP_SEA: [u8; 3] = [18, 42, 92];
const SHALLOW_SEA: [u8; 3] = [64, 120, 178];
const LOWLAND: [u8; 3] = [94, 148, 74];
const HIGHLAND: [u8; 3] = [156, 136, 96];
const PEAK: [u8; 3] = [236, 236, 236];
const LAKE: [u8; 3] = [80, 150, 200];
/// Доля цвета королевства в заливке суши
const TERRITORY_TINT: f32 = 0.35;

const COAST: Rgba<u8> = Rgba([20, 30, 40, 255]);
const SHORE: Rgba<u8> = Rgba([30, 70, 120, 255]);
const BORDER: Rgba<u8> = Rgba([90, 20, 20, 255]);
const RIVER: Rgba<u8> = Rgba([40, 90, 200, 255]);
const HIGHWAY: Rgba<u8> = Rgba([120, 60, 20, 255]);
const LOCAL_ROAD: Rgba<u8> = Rgba([170, 120, 70, 255]);
const CAPITAL: Rgba<u8> = Rgba([200, 20, 20, 255]);
const TOWN: Rgba<u8> = Rgba([30, 30, 30, 255]);

/// Рисует мир шириной `width_px` пикселей; высота — по пропорциям области.
#[must_use]
pub fn render_preview(world: &World, width_px: u32) -> RgbaImage {
    let partition = &world.partition;
    let bounds = partition.bounds();
    let width_px = width_px.max(1);
    let scale = f64::from(width_px) / bounds.width;
    let height_px = ((bounds.height * scale).round() as u32).max(1);
    let palette = world.request.political.palette_size.max(1);

    let cell_colors: Vec<[u8; 3]> = (0..partition.len())
        .map(|cell| cell_color(world, cell, palette))
        .collect();

    let mut img = RgbaImage::new(width_px, height_px);
    let mut row_hint = 0;
    for y in 0..height_px {
        let mut hint = row_hint;
        for x in 0..width_px {
            let p = Point::new(
                (f64::from(x) + 0.5) / scale,
                (f64::from(y) + 0.5) / scale,
            );
            if let Some(cell) = partition.locate_from(hint, p) {
                if x == 0 {
                    row_hint = cell;
                }
                hint = cell;
                let [r, g, b] = cell_colors[cell];
                img.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }

    let to_px = |p: Point| ((p.x * scale) as f32, (p.y * scale) as f32);

    for outline in territory_borders(partition, &world.political) {
        draw_polyline(&mut img, outline.points.iter().map(|&p| to_px(p)), false, BORDER);
    }
    for outline in coastlines(partition, &world.terrain) {
        draw_polyline(&mut img, outline.points.iter().map(|&p| to_px(p)), outline.closed, COAST);
    }
    for outline in lake_shores(partition, &world.hydrology) {
        draw_polyline(&mut img, outline.points.iter().map(|&p| to_px(p)), outline.closed, SHORE);
    }
    for river in world.hydrology.rivers() {
        let points = river.cells.iter().map(|&c| to_px(partition.center(c)));
        draw_polyline(&mut img, points, false, RIVER);
    }
    for road in &world.roads {
        let color = match road.importance {
            RoadImportance::Highway => HIGHWAY,
            RoadImportance::Local => LOCAL_ROAD,
        };
        draw_polyline(&mut img, road.cells.iter().map(|&c| to_px(partition.center(c))), false, color);
    }
    for settlement in &world.settlements {
        let (x, y) = to_px(partition.center(settlement.cell));
        let (radius, color) = match settlement.role {
            SettlementRole::Capital => (4, CAPITAL),
            SettlementRole::Town => (2, TOWN),
        };
        draw_filled_circle_mut(&mut img, (x as i32, y as i32), radius, color);
    }

    img
}

pub fn save_preview(world: &World, width_px: u32, path: impl AsRef<Path>) -> Result<(), GenerationError> {
    let img = render_preview(world, width_px);
    img.save(path.as_ref())?;
    tracing::info!(path = %path.as_ref().display(), width = img.width(), height = img.height(), "превью сохранено");
    Ok(())
}

fn cell_color(world: &World, cell: usize, palette: usize) -> [u8; 3] {
    let e = world.terrain.elevation(cell);
    if world.hydrology.lake_of(cell).is_some() {
        return LAKE;
    }
    if !world.terrain.is_land(cell) {
        let depth = ((e - SEA_LEVEL) / MIN_DEPTH).clamp(0.0, 1.0);
        return mix(SHALLOW_SEA, DEEP_SEA, depth);
    }

    let h = ((e - SEA_LEVEL) / MAX_HEIGHT).clamp(0.0, 1.0);
    let base = if h < 0.5 {
        mix(LOWLAND, HIGHLAND, h * 2.0)
    } else {
        mix(HIGHLAND, PEAK, (h - 0.5) * 2.0)
    };
    match world.political.territory_of(cell) {
        Some(id) => {
            let color = world.political.territories()[id].color;
            mix(base, palette_color(color, palette), TERRITORY_TINT)
        }
        None => base,
    }
}

/// Цвет палитры: оттенки равномерно по кругу. Соседние индексы — соседние оттенки.
fn palette_color(index: usize, palette: usize) -> [u8; 3] {
    let hue = index as f32 / palette as f32 * 6.0;
    let x = 1.0 - (hue % 2.0 - 1.0).abs();
    let (r, g, b) = match hue as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

fn mix(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let lerp = |x: u8, y: u8| (f32::from(x) + (f32::from(y) - f32::from(x)) * t).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

fn draw_polyline(
    img: &mut RgbaImage,
    points: impl Iterator<Item = (f32, f32)>,
    closed: bool,
    color: Rgba<u8>,
) {
    let points: Vec<(f32, f32)> = points.collect();
    for pair in points.windows(2) {
        draw_line_segment_mut(img, pair[0], pair[1], color);
    }
    if closed && points.len() > 2 {
        draw_line_segment_mut(img, points[points.len() - 1], points[0], color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationRequest;
    use crate::world::generate;

    #[test]
    fn preview_keeps_the_aspect_ratio() {
        let request = GenerationRequest {
            seed: 12,
            cell_count: 300,
            width: 400.0,
            height: 200.0,
            ..GenerationRequest::default()
        };
        let world = generate(&request).unwrap();
        let img = render_preview(&world, 160);
        assert_eq!(img.dimensions(), (160, 80));
        assert!(img.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn palette_neighbors_differ() {
        assert_ne!(palette_color(0, 12), palette_color(1, 12));
        assert_eq!(mix([0, 0, 0], [200, 100, 50], 0.5), [100, 50, 25]);
    }
}
