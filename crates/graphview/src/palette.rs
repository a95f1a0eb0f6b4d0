use gpui::{Rgba, rgb, rgba};
use graph_model::Zone;

/// Fill color for a node circle, by functional zone.
pub fn zone_color(zone: Zone) -> Rgba {
    match zone {
        Zone::Perception => rgb(0x3b82f6),
        Zone::Reasoning => rgb(0xf59e0b),
        Zone::Action => rgb(0x16a34a),
        Zone::Memory => rgb(0xef4444),
    }
}

/// Edge stroke color: the source node's zone at reduced opacity, so edge
/// bundles read as flows out of a layer without overpowering the nodes.
pub fn edge_color(source_zone: Zone) -> Rgba {
    match source_zone {
        Zone::Perception => rgba(0x3b82f699),
        Zone::Reasoning => rgba(0xf59e0b99),
        Zone::Action => rgba(0x16a34a99),
        Zone::Memory => rgba(0xef444499),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_zone_has_a_distinct_fill() {
        let colors = [
            zone_color(Zone::Perception),
            zone_color(Zone::Reasoning),
            zone_color(Zone::Action),
            zone_color(Zone::Memory),
        ];
        for i in 0..colors.len() {
            for j in (i + 1)..colors.len() {
                assert_ne!(colors[i], colors[j]);
            }
        }
    }

    #[test]
    fn edge_color_is_translucent_zone_color() {
        let full = zone_color(Zone::Reasoning);
        let dim = edge_color(Zone::Reasoning);
        assert_eq!((dim.r, dim.g, dim.b), (full.r, full.g, full.b));
        assert!(dim.a < full.a);
    }
}
