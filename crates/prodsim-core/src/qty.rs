use fixed::types::I32F32;

/// Q32.32 fixed-point quantity: 32 integer bits, 32 fractional bits.
///
/// All material quantities use this type so that the split/merge bookkeeping
/// in the storage engine is exact. Floating point would accumulate error
/// across repeated partial removals and break the conservation checks.
pub type Qty = I32F32;

/// Convert an f64 to a Qty. Use for initialization and manifests only.
#[inline]
pub fn qty(v: f64) -> Qty {
    Qty::from_num(v)
}

/// Convert a Qty to f64. Use for display only.
#[inline]
pub fn qty_to_f64(v: Qty) -> f64 {
    v.to_num::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qty_basic_arithmetic() {
        let a = qty(1.5);
        let b = qty(2.0);
        assert_eq!(qty_to_f64(a + b), 3.5);
    }

    #[test]
    fn qty_exact_split_reassembly() {
        // 7 removed from 9 and 2 put back must reassemble to exactly 9.
        let total = qty(9.0);
        let removed = qty(7.0);
        let rest = total - removed;
        assert_eq!(removed + rest, total);
    }

    #[test]
    fn qty_determinism() {
        let a = qty(1.0 / 3.0);
        let b = qty(1.0 / 3.0);
        assert_eq!(a, b);
    }

    #[test]
    fn qty_ordering() {
        assert!(qty(1.0) < qty(2.0));
    }
}
