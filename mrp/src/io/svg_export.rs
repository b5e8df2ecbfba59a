use svg::node::element::path::Data;
use svg::node::element::{Group, Path};
use svg::Document;

use polypack::{Bin, Rect};

const PIECE_FILLS: [&str; 6] = [
    "#7fb3d5", "#f5b041", "#82e0aa", "#d98880", "#bb8fce", "#f7dc6f",
];

/// Draws a bin and its placed pieces. Pieces are filled paths (holes cut
/// out by the even-odd rule), the bin is an outline.
pub fn bin_to_svg(bin: &Bin) -> Document {
    let dim = bin.dimension();
    let stroke_width = f64::max(dim.width(), dim.height()) * 0.002;

    // flip the y-axis: the bin's origin is bottom-left, SVG's is top-left
    let mut group = Group::new().set(
        "transform",
        format!("translate(0,{}) scale(1,-1)", dim.y_max + dim.y_min),
    );

    group = group.add(
        Path::new()
            .set("d", rect_data(dim))
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", stroke_width),
    );

    for (i, piece) in bin.placed_pieces().iter().enumerate() {
        let mut data = Data::new();
        for polygon in piece.shape().iter() {
            data = ring_data(data, &polygon.exterior().0);
            for interior in polygon.interiors() {
                data = ring_data(data, &interior.0);
            }
        }
        group = group.add(
            Path::new()
                .set("d", data)
                .set("fill", PIECE_FILLS[i % PIECE_FILLS.len()])
                .set("fill-rule", "evenodd")
                .set("stroke", "black")
                .set("stroke-width", stroke_width),
        );
    }

    Document::new()
        .set(
            "viewBox",
            (
                dim.x_min - stroke_width,
                dim.y_min - stroke_width,
                dim.width() + 2.0 * stroke_width,
                dim.height() + 2.0 * stroke_width,
            ),
        )
        .add(group)
}

fn rect_data(rect: Rect) -> Data {
    Data::new()
        .move_to((rect.x_min, rect.y_min))
        .line_to((rect.x_max, rect.y_min))
        .line_to((rect.x_max, rect.y_max))
        .line_to((rect.x_min, rect.y_max))
        .close()
}

fn ring_data(mut data: Data, ring: &[geo::Coord<f64>]) -> Data {
    let Some(first) = ring.first() else {
        return data;
    };
    data = data.move_to((first.x, first.y));
    for c in &ring[1..] {
        data = data.line_to((c.x, c.y));
    }
    data.close()
}
