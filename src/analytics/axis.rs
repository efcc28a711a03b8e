/// Y-axis window for a set of plotted counts: padded bounds plus a tick
/// step, all in whole model counts. Counts never go below zero, so the lower
/// bound is clamped there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisScale {
    pub min: u64,
    pub max: u64,
    pub step: u64,
}

impl AxisScale {
    /// Fit an axis around `values`. With no values at all the axis falls back
    /// to a neutral 0..100 window so an empty chart still has a frame.
    ///
    /// Narrow data gets at least two counts of headroom on each side; wider
    /// data gets 10% of its spread. The tick step then scales with the padded
    /// range so the axis stays readable whether it spans four counts or four
    /// hundred.
    pub fn compute<I>(values: I) -> AxisScale
    where
        I: IntoIterator<Item = u64>,
    {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return AxisScale {
                min: 0,
                max: 100,
                step: 10,
            };
        };

        let mut lo = first;
        let mut hi = first;
        for value in iter {
            lo = lo.min(value);
            hi = hi.max(value);
        }

        let range = hi - lo;
        let padding = if range < 5 {
            2.max(range.div_ceil(2))
        } else {
            range.div_ceil(10)
        };

        let min = lo.saturating_sub(padding);
        let max = hi + padding;
        let padded = max - min;

        let step = if padded <= 10 {
            1
        } else if padded <= 50 {
            1.max(padded.div_ceil(10))
        } else if padded <= 100 {
            5.max(padded.div_ceil(15))
        } else {
            10.max(padded.div_ceil(10))
        };

        AxisScale { min, max, step }
    }

    pub fn bounds(self) -> [f64; 2] {
        [self.min as f64, self.max as f64]
    }

    /// Tick values to label. When the step divides the window evenly and the
    /// result stays short, every step multiple is labelled; otherwise fall
    /// back to min / midpoint / max, which render correctly under even label
    /// spacing regardless of the step.
    pub fn ticks(self) -> Vec<u64> {
        let span = self.max - self.min;
        if self.step > 0 && span % self.step == 0 && span / self.step <= 8 {
            (0..=span / self.step)
                .map(|i| self.min + i * self.step)
                .collect()
        } else {
            vec![self.min, self.min + span / 2, self.max]
        }
    }
}
