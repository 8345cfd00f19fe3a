use super::Palette;
use crate::color::Rgb;
use crate::geometry::{chrom_ticks, LABEL_MIN_ARC, TICK_MIN_ARC};
use crate::layout::{ChromSector, RadialBand};
use crate::scene::{ArcGeom, SceneNode, Timing, Transition};

const TICK_LENGTH: f64 = 5.0;
const TICK_LABEL_OFFSET: f64 = 8.0;

/// Outermost ring: chromosome names along each sector and distance ticks
/// on its outer edge. It has no data source.
#[derive(Debug)]
pub struct LabelRenderer {
    sectors: Vec<ChromSector>,
    band: Transition<RadialBand>,
    palette: Palette,
    tick_step: u64,
    text: Rgb,
}

impl LabelRenderer {
    pub fn new(sectors: &[ChromSector], band: RadialBand, palette: Palette, tick_step: u64) -> Self {
        Self {
            sectors: sectors.to_vec(),
            band: Transition::settled(band),
            palette,
            tick_step,
            text: Rgb::BLACK,
        }
    }

    pub fn relayout(&mut self, sectors: &[ChromSector], band: RadialBand, timing: Timing) {
        self.sectors = sectors.to_vec();
        self.band.retarget(band, timing);
    }

    pub fn set_appearance(&mut self, palette: Palette, tick_step: u64) {
        self.palette = palette;
        self.tick_step = tick_step;
    }

    pub fn band(&self) -> RadialBand {
        *self.band.target()
    }

    pub fn scene(&self, now_ms: f64) -> SceneNode {
        let band = self.band.sample(now_ms);

        let arcs = self
            .sectors
            .iter()
            .map(|s| SceneNode::ArcSector {
                geom: ArcGeom {
                    start_angle: s.start_angle,
                    end_angle: s.end_angle,
                    inner_radius: band.inner_radius,
                    outer_radius: band.outer_radius,
                },
                fill: self.palette.idle,
                stroke: None,
            })
            .collect();

        let names = self
            .sectors
            .iter()
            .filter(|s| s.span() >= LABEL_MIN_ARC)
            .map(|s| SceneNode::TextOnArc {
                text: s.chrom.clone(),
                start_angle: s.start_angle,
                end_angle: s.end_angle,
                radius: band.mid_radius(),
                fill: self.text,
            })
            .collect();

        let mut ticks = Vec::new();
        for sector in self.sectors.iter().filter(|s| s.span() >= TICK_MIN_ARC) {
            for tick in chrom_ticks(sector.length, self.tick_step) {
                let angle = sector.angle_of(tick.position);
                ticks.push(SceneNode::RadialLine {
                    angle,
                    inner_radius: band.outer_radius,
                    outer_radius: band.outer_radius + TICK_LENGTH,
                    stroke: self.text,
                });
                if let Some(label) = tick.label {
                    ticks.push(SceneNode::Text {
                        text: label,
                        angle,
                        radius: band.outer_radius + TICK_LABEL_OFFSET,
                        fill: self.text,
                    });
                }
            }
        }

        SceneNode::group(
            "label-track",
            None,
            vec![
                SceneNode::group("background", None, arcs),
                SceneNode::group("labels", None, names),
                SceneNode::group("ticks", None, ticks),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VizConfig;
    use crate::genome::Genome;
    use crate::layout::layout_sectors;

    fn renderer(lengths: &[(&str, u64)]) -> LabelRenderer {
        let genome = Genome::from_lengths(lengths.iter().copied()).unwrap();
        let sectors = layout_sectors(&genome, 0.0).unwrap();
        LabelRenderer::new(
            &sectors,
            RadialBand { inner_radius: 440.0, outer_radius: 460.0 },
            Palette::from_config(&VizConfig::default()),
            25_000_000,
        )
    }

    #[test]
    fn test_narrow_sectors_get_no_labels_or_ticks() {
        // chrM takes about 0.03 rad of the turn.
        let r = renderer(&[("chr1", 200_000_000), ("chrM", 1_000_000)]);
        let scene = r.scene(0.0);

        let names: Vec<&str> = scene
            .find_group("labels")
            .unwrap()
            .children()
            .iter()
            .filter_map(|n| match n {
                SceneNode::TextOnArc { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["chr1"]);

        let ticks = scene.find_group("ticks").unwrap();
        assert_eq!(ticks.count(|n| matches!(n, SceneNode::RadialLine { .. })), 8);
        assert_eq!(ticks.count(|n| matches!(n, SceneNode::Text { .. })), 3);
    }

    #[test]
    fn test_ticks_sit_on_outer_edge() {
        let r = renderer(&[("chr1", 100_000_000)]);
        let scene = r.scene(0.0);
        match &scene.find_group("ticks").unwrap().children()[0] {
            SceneNode::RadialLine { angle, inner_radius, outer_radius, .. } => {
                assert!(angle.abs() < 1e-9);
                assert_eq!(*inner_radius, 460.0);
                assert_eq!(*outer_radius, 465.0);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_relayout_moves_band() {
        let mut r = renderer(&[("chr1", 100)]);
        let sectors = r.sectors.clone();
        let band = RadialBand { inner_radius: 300.0, outer_radius: 320.0 };
        r.relayout(&sectors, band, Timing::instant(0.0));
        assert_eq!(r.band(), band);
    }
}
