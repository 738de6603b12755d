//! Human-readable byte counts.

const KIBI: i64 = 1024;
const MEBI: i64 = KIBI * KIBI;
const GIBI: i64 = MEBI * KIBI;
const TEBI: i64 = GIBI * KIBI;
const PEBI: i64 = TEBI * KIBI;
const EXBI: i64 = PEBI * KIBI;

/// Formats a byte count with binary units, two decimals above 1 KiB.
pub fn binary_size(size: i64) -> String {
    if size < 0 {
        String::new()
    } else if size < KIBI {
        format!("{size} B")
    } else if size < MEBI {
        format!("{:.2} KiB", size as f64 / KIBI as f64)
    } else if size < GIBI {
        format!("{:.2} MiB", size as f64 / MEBI as f64)
    } else if size < TEBI {
        format!("{:.2} GiB", size as f64 / GIBI as f64)
    } else if size < PEBI {
        format!("{:.2} TiB", size as f64 / TEBI as f64)
    } else if size < EXBI {
        format!("{:.2} PiB", size as f64 / PEBI as f64)
    } else {
        format!("{:.2} EiB", size as f64 / EXBI as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(binary_size(0), "0 B");
        assert_eq!(binary_size(1023), "1023 B");
        assert_eq!(binary_size(1024), "1.00 KiB");
        assert_eq!(binary_size(1_536), "1.50 KiB");
        assert_eq!(binary_size(5 * MEBI), "5.00 MiB");
        assert_eq!(binary_size(3 * GIBI + GIBI / 2), "3.50 GiB");
        assert_eq!(binary_size(2 * TEBI), "2.00 TiB");
    }

    #[test]
    fn negative_sizes_render_empty() {
        assert_eq!(binary_size(-1), "");
    }
}
