/// Linear map from a data extent onto a pixel range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f32, f32),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f32, f32)) -> Self {
        Self { domain, range }
    }

    /// Scale over the extent of `values`. An empty or non-finite input yields
    /// the unit domain.
    pub fn from_extent(values: impl IntoIterator<Item = f64>, range: (f32, f32)) -> Self {
        Self::new(extent(values).unwrap_or((0.0, 1.0)), range)
    }

    /// Same as [`LinearScale::from_extent`] with the domain flipped, so the
    /// largest value lands on `range.0`.
    pub fn from_extent_reversed(values: impl IntoIterator<Item = f64>, range: (f32, f32)) -> Self {
        let (min, max) = extent(values).unwrap_or((0.0, 1.0));
        Self::new((max, min), range)
    }

    pub fn apply(&self, value: f64) -> f32 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() || !value.is_finite() {
            return (r0 + r1) * 0.5;
        }

        let t = ((value - d0) / span) as f32;
        r0 + (r1 - r0) * t
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn range(&self) -> (f32, f32) {
        self.range
    }
}

fn extent(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|value| value.is_finite())
        .fold(None, |acc, value| match acc {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extent_onto_range() {
        let scale = LinearScale::from_extent([0.0, 2.0, 1.0], (0.0, 300.0));
        assert_eq!(scale.apply(0.0), 0.0);
        assert_eq!(scale.apply(1.0), 150.0);
        assert_eq!(scale.apply(2.0), 300.0);
    }

    #[test]
    fn reversed_scale_puts_largest_value_first() {
        let scale = LinearScale::from_extent_reversed([0.0, 4.0], (0.0, 100.0));
        assert_eq!(scale.apply(4.0), 0.0);
        assert_eq!(scale.apply(0.0), 100.0);
    }

    #[test]
    fn degenerate_domain_maps_to_midpoint() {
        let scale = LinearScale::from_extent([3.0, 3.0], (0.0, 100.0));
        assert_eq!(scale.apply(3.0), 50.0);
        assert_eq!(scale.apply(f64::NAN), 50.0);

        let empty = LinearScale::from_extent(std::iter::empty(), (10.0, 20.0));
        assert_eq!(empty.domain(), (0.0, 1.0));
        assert_eq!(empty.range(), (10.0, 20.0));
    }
}
