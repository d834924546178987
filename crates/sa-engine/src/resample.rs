//! Trace resampling
//!
//! Converts a trace of any length to a caller-chosen point count. Five
//! operations are supported:
//!
//! - **Point**: nearest sample, `dest[d] = src[floor(0.5 + d * (ns - 1) / nd)]`
//! - **Average / Min / Max**: each destination bucket reduces the source
//!   samples that fall into it
//! - **Spline**: natural cubic spline through the source, evaluated at evenly
//!   spaced positions
//!
//! Equal lengths always copy exactly. Upsampling with a reducing operation
//! has no samples to reduce, so it switches to Spline.

use serde::{Deserialize, Serialize};

/// Resampling operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResampleOp {
    /// Nearest source sample
    #[default]
    Point,
    /// Natural cubic spline
    Spline,
    /// Mean of each bucket
    Average,
    /// Minimum of each bucket
    Min,
    /// Maximum of each bucket
    Max,
}

impl ResampleOp {
    /// Parse an operation name as given on the command line
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag.to_ascii_lowercase().as_str() {
            "point" | "pt" | "nearest" => Some(ResampleOp::Point),
            "spline" | "spl" | "cubic" => Some(ResampleOp::Spline),
            "avg" | "average" | "mean" => Some(ResampleOp::Average),
            "min" => Some(ResampleOp::Min),
            "max" | "peak" => Some(ResampleOp::Max),
            _ => None,
        }
    }

    /// Short name
    pub fn name(&self) -> &'static str {
        match self {
            ResampleOp::Point => "point",
            ResampleOp::Spline => "spline",
            ResampleOp::Average => "avg",
            ResampleOp::Min => "min",
            ResampleOp::Max => "max",
        }
    }

    fn reduces(&self) -> bool {
        matches!(self, ResampleOp::Average | ResampleOp::Min | ResampleOp::Max)
    }
}

/// Operation actually applied for a given source and destination length
pub fn effective_op(ns: usize, nd: usize, op: ResampleOp) -> ResampleOp {
    if nd == ns {
        ResampleOp::Point
    } else if nd > ns && op.reduces() {
        ResampleOp::Spline
    } else {
        op
    }
}

/// Resample `src` to `nd` points
pub fn resample(src: &[f64], nd: usize, op: ResampleOp) -> Vec<f64> {
    let ns = src.len();
    if ns == 0 || nd == 0 {
        return Vec::new();
    }
    if nd == ns {
        return src.to_vec();
    }

    match effective_op(ns, nd, op) {
        ResampleOp::Point => point(src, nd),
        ResampleOp::Spline => spline(src, nd),
        reduce => buckets(src, nd, reduce),
    }
}

fn point(src: &[f64], nd: usize) -> Vec<f64> {
    let ns = src.len();
    let step = (ns - 1) as f64 / nd as f64;
    (0..nd)
        .map(|d| {
            let i = (0.5 + d as f64 * step).floor() as usize;
            src[i.min(ns - 1)]
        })
        .collect()
}

/// Destination bucket a source sample falls into
///
/// The bucket index is the integer part of an accumulator that advances by
/// `nd / ns` per sample; the last sample always lands in the last bucket.
pub fn bucket_of(i: usize, ns: usize, nd: usize) -> usize {
    if i + 1 >= ns {
        nd - 1
    } else {
        (i * nd / ns).min(nd - 1)
    }
}

/// Running reduction of one bucket
#[derive(Debug, Clone, Copy)]
struct Reduction {
    op: ResampleOp,
    acc: f64,
    count: usize,
}

impl Reduction {
    fn new(op: ResampleOp) -> Self {
        let acc = match op {
            ResampleOp::Min => f64::INFINITY,
            ResampleOp::Max => f64::NEG_INFINITY,
            _ => 0.0,
        };
        Self { op, acc, count: 0 }
    }

    fn add(&mut self, v: f64) {
        self.acc = match self.op {
            ResampleOp::Min => self.acc.min(v),
            ResampleOp::Max => self.acc.max(v),
            _ => self.acc + v,
        };
        self.count += 1;
    }

    fn finish(&self) -> Option<f64> {
        match (self.count, self.op) {
            (0, _) => None,
            (n, ResampleOp::Average) => Some(self.acc / n as f64),
            _ => Some(self.acc),
        }
    }
}

fn buckets(src: &[f64], nd: usize, op: ResampleOp) -> Vec<f64> {
    let ns = src.len();
    let mut out = Vec::with_capacity(nd);
    let mut current = Reduction::new(op);

    for (i, &v) in src.iter().enumerate() {
        let bucket = bucket_of(i, ns, nd);
        while out.len() < bucket {
            // A bucket no sample fell into takes the next sample's value
            out.push(current.finish().unwrap_or(v));
            current = Reduction::new(op);
        }
        current.add(v);
    }
    if let Some(last) = current.finish() {
        out.push(last);
    }
    out
}

/// Second derivatives of the natural cubic spline through unit-spaced `y`
fn spline_moments(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    // Tridiagonal system for the interior points: m[i-1] + 4 m[i] + m[i+1] = rhs[i]
    let interior = n - 2;
    let mut diag = vec![4.0; interior];
    let mut rhs: Vec<f64> = (1..n - 1)
        .map(|i| 6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]))
        .collect();

    for k in 1..interior {
        let w = 1.0 / diag[k - 1];
        diag[k] -= w;
        rhs[k] -= w * rhs[k - 1];
    }

    m[interior] = rhs[interior - 1] / diag[interior - 1];
    for k in (0..interior - 1).rev() {
        m[k + 1] = (rhs[k] - m[k + 2]) / diag[k];
    }
    m
}

fn spline(src: &[f64], nd: usize) -> Vec<f64> {
    let ns = src.len();
    if ns == 1 {
        return vec![src[0]; nd];
    }

    let m = spline_moments(src);
    let last = ns - 1;

    (0..nd)
        .map(|d| {
            let x = if nd == 1 {
                last as f64 / 2.0
            } else {
                (d * last) as f64 / (nd - 1) as f64
            };
            let k = (x.floor() as usize).min(last - 1);
            let t = x - k as f64;
            let u = 1.0 - t;
            u * src[k]
                + t * src[k + 1]
                + ((u * u * u - u) * m[k] + (t * t * t - t) * m[k + 1]) / 6.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_average_halves() {
        assert_eq!(
            resample(&[0.0, 10.0, 20.0, 30.0], 2, ResampleOp::Average),
            vec![5.0, 25.0]
        );
    }

    #[test]
    fn test_single_point_fills() {
        assert_eq!(resample(&[5.0], 8, ResampleOp::Point), vec![5.0; 8]);
        assert_eq!(resample(&[5.0], 8, ResampleOp::Max), vec![5.0; 8]);
    }

    #[test]
    fn test_empty() {
        assert!(resample(&[], 10, ResampleOp::Point).is_empty());
        assert!(resample(&[1.0, 2.0], 0, ResampleOp::Spline).is_empty());
    }

    #[test]
    fn test_min_max() {
        let src = [3.0, -1.0, 7.0, 2.0, 0.0, 9.0];
        assert_eq!(resample(&src, 3, ResampleOp::Min), vec![-1.0, 2.0, 0.0]);
        assert_eq!(resample(&src, 3, ResampleOp::Max), vec![3.0, 7.0, 9.0]);
    }

    #[test]
    fn test_point_downsample() {
        let src: Vec<f64> = (0..10).map(f64::from).collect();
        // floor(0.5 + d * 9 / 5) for d = 0..5
        assert_eq!(
            resample(&src, 5, ResampleOp::Point),
            vec![0.0, 2.0, 4.0, 5.0, 7.0]
        );
    }

    #[test]
    fn test_upsampling_reduction_becomes_spline() {
        assert_eq!(effective_op(4, 8, ResampleOp::Average), ResampleOp::Spline);
        assert_eq!(effective_op(8, 4, ResampleOp::Average), ResampleOp::Average);
        assert_eq!(effective_op(8, 8, ResampleOp::Spline), ResampleOp::Point);
        assert_eq!(
            resample(&[0.0, 1.0], 5, ResampleOp::Max),
            resample(&[0.0, 1.0], 5, ResampleOp::Spline)
        );
    }

    #[test]
    fn test_spline_reproduces_lines() {
        let src: Vec<f64> = (0..6).map(|i| 2.0 * f64::from(i) - 1.0).collect();
        let out = resample(&src, 11, ResampleOp::Spline);
        for (d, v) in out.iter().enumerate() {
            let expected = 2.0 * (d as f64 / 2.0) - 1.0;
            assert!((v - expected).abs() < 1e-9, "{} vs {}", v, expected);
        }
    }

    #[test]
    fn test_spline_hits_knots() {
        let src = [0.0, 4.0, -2.0, 3.0, 1.0];
        let out = resample(&src, 9, ResampleOp::Spline);
        for (i, &y) in src.iter().enumerate() {
            assert!((out[2 * i] - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_op_flags() {
        assert_eq!(ResampleOp::from_flag("AVG"), Some(ResampleOp::Average));
        assert_eq!(ResampleOp::from_flag("spline"), Some(ResampleOp::Spline));
        assert_eq!(ResampleOp::from_flag("median"), None);
        for op in [
            ResampleOp::Point,
            ResampleOp::Spline,
            ResampleOp::Average,
            ResampleOp::Min,
            ResampleOp::Max,
        ] {
            assert_eq!(ResampleOp::from_flag(op.name()), Some(op));
        }
    }

    fn any_op() -> impl Strategy<Value = ResampleOp> {
        prop_oneof![
            Just(ResampleOp::Point),
            Just(ResampleOp::Spline),
            Just(ResampleOp::Average),
            Just(ResampleOp::Min),
            Just(ResampleOp::Max),
        ]
    }

    proptest! {
        #[test]
        fn prop_equal_length_is_identity(
            src in proptest::collection::vec(-150.0f64..30.0, 1..300),
            op in any_op(),
        ) {
            prop_assert_eq!(resample(&src, src.len(), op), src);
        }

        #[test]
        fn prop_output_length(
            src in proptest::collection::vec(-150.0f64..30.0, 1..300),
            nd in 1usize..700,
            op in any_op(),
        ) {
            prop_assert_eq!(resample(&src, nd, op).len(), nd);
        }

        #[test]
        fn prop_every_bucket_is_covered(ns in 2usize..2000, nd in 1usize..2000) {
            prop_assume!(nd < ns);
            let mut seen = vec![false; nd];
            for i in 0..ns {
                seen[bucket_of(i, ns, nd)] = true;
            }
            prop_assert!(seen.iter().all(|&s| s));
        }

        #[test]
        fn prop_reductions_are_ordered(
            src in proptest::collection::vec(-150.0f64..30.0, 2..400),
            nd in 1usize..400,
        ) {
            prop_assume!(nd < src.len());
            let lo = resample(&src, nd, ResampleOp::Min);
            let avg = resample(&src, nd, ResampleOp::Average);
            let hi = resample(&src, nd, ResampleOp::Max);
            for d in 0..nd {
                prop_assert!(lo[d] <= avg[d] + 1e-9);
                prop_assert!(avg[d] <= hi[d] + 1e-9);
            }
        }
    }
}
