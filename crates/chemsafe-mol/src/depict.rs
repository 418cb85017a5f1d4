//! Raster depiction of a molecular graph.
//!
//! Presentation-only: a circle-seeded force layout, bonds as lines, atoms as
//! element-colored dots. Returns `None` when the notation does not decode;
//! it never errors, because display must not be able to break a scan.

use std::io::Cursor;

use image::{ImageOutputFormat, Rgb, RgbImage};

use crate::mol::{BondOrder, Mol};
use crate::smiles;

const LAYOUT_ITERATIONS: usize = 120;
const SPRING_LENGTH: f64 = 1.0;

/// Render `smiles` to PNG bytes, or `None` if it does not decode.
pub fn depict(smiles: &str, size: (u32, u32)) -> Option<Vec<u8>> {
    let mol = smiles::parse(smiles).ok()?;
    if mol.atom_count() == 0 {
        return None;
    }
    let coords = layout(&mol);
    let img = draw(&mol, &coords, size);
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .ok()?;
    Some(bytes.into_inner())
}

/// Circle seed + a few rounds of spring relaxation. Not publication
/// quality, but stable and readable for small molecules.
fn layout(mol: &Mol) -> Vec<(f64, f64)> {
    let n = mol.atom_count();
    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = (i as f64) * std::f64::consts::TAU / (n as f64);
            (angle.cos(), angle.sin())
        })
        .collect();
    if n == 1 {
        return pos;
    }

    for _ in 0..LAYOUT_ITERATIONS {
        let mut force = vec![(0.0f64, 0.0f64); n];
        // Pairwise repulsion.
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = pos[i].0 - pos[j].0;
                let dy = pos[i].1 - pos[j].1;
                let d2 = (dx * dx + dy * dy).max(1e-4);
                let f = 0.12 / d2;
                let d = d2.sqrt();
                force[i].0 += f * dx / d;
                force[i].1 += f * dy / d;
                force[j].0 -= f * dx / d;
                force[j].1 -= f * dy / d;
            }
        }
        // Bond springs.
        for edge in mol.bonds() {
            let (a, b) = mol.endpoints(edge);
            let (i, j) = (a.index(), b.index());
            let dx = pos[j].0 - pos[i].0;
            let dy = pos[j].1 - pos[i].1;
            let d = (dx * dx + dy * dy).sqrt().max(1e-4);
            let f = 0.3 * (d - SPRING_LENGTH);
            force[i].0 += f * dx / d;
            force[i].1 += f * dy / d;
            force[j].0 -= f * dx / d;
            force[j].1 -= f * dy / d;
        }
        for i in 0..n {
            pos[i].0 += force[i].0.clamp(-0.15, 0.15);
            pos[i].1 += force[i].1.clamp(-0.15, 0.15);
        }
    }
    pos
}

fn element_color(atomic_num: u8) -> Rgb<u8> {
    match atomic_num {
        6 => Rgb([60, 60, 60]),    // C
        7 => Rgb([48, 80, 248]),   // N
        8 => Rgb([255, 13, 13]),   // O
        9 | 17 => Rgb([31, 240, 31]), // F / Cl
        16 => Rgb([255, 200, 50]), // S
        35 => Rgb([166, 41, 41]),  // Br
        53 => Rgb([148, 0, 148]),  // I
        15 => Rgb([255, 128, 0]),  // P
        _ => Rgb([120, 80, 200]),
    }
}

fn draw(mol: &Mol, coords: &[(f64, f64)], (width, height): (u32, u32)) -> RgbImage {
    let width = width.max(32);
    let height = height.max(32);
    let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    // Fit layout coordinates into the canvas with a margin.
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for &(x, y) in coords {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    let span_x = (max_x - min_x).max(1e-6);
    let span_y = (max_y - min_y).max(1e-6);
    let margin = 24.0;
    let scale =
        ((width as f64 - 2.0 * margin) / span_x).min((height as f64 - 2.0 * margin) / span_y);
    let project = |(x, y): (f64, f64)| -> (i32, i32) {
        let px = margin + (x - min_x) * scale
            + (width as f64 - 2.0 * margin - span_x * scale) / 2.0;
        let py = margin + (y - min_y) * scale
            + (height as f64 - 2.0 * margin - span_y * scale) / 2.0;
        (px.round() as i32, py.round() as i32)
    };

    let bond_color = Rgb([40, 40, 40]);
    for edge in mol.bonds() {
        let (a, b) = mol.endpoints(edge);
        let p0 = project(coords[a.index()]);
        let p1 = project(coords[b.index()]);
        let strokes = match mol.bond(edge).order {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        };
        for stroke in 0..strokes {
            let offset = (stroke as i32) * 3 - (strokes as i32 - 1) * 3 / 2;
            draw_line(&mut img, offset_point(p0, p1, offset), offset_point(p1, p0, -offset), bond_color);
        }
    }

    for idx in mol.atoms() {
        let (cx, cy) = project(coords[idx.index()]);
        fill_disc(&mut img, cx, cy, 5, element_color(mol.atom(idx).atomic_num));
    }

    img
}

/// Shift `p` perpendicular to the segment `p → q` by `offset` pixels.
fn offset_point(p: (i32, i32), q: (i32, i32), offset: i32) -> (i32, i32) {
    if offset == 0 {
        return p;
    }
    let dx = (q.0 - p.0) as f64;
    let dy = (q.1 - p.1) as f64;
    let len = (dx * dx + dy * dy).sqrt().max(1.0);
    let (nx, ny) = (-dy / len, dx / len);
    (
        p.0 + (nx * offset as f64).round() as i32,
        p.1 + (ny * offset as f64).round() as i32,
    )
}

fn draw_line(img: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32), color: Rgb<u8>) {
    // Bresenham.
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y) = (x0, y0);
    let mut err = dx + dy;
    loop {
        put_pixel_checked(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn fill_disc(img: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_checked(img, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_checked(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}
