//! Z-order sorting for batched UI layers
//!
//! The host stacks objects by creation order: first created ends up at the
//! bottom. A layer name like `30_rate_dial` carries its stacking key as a
//! leading decimal prefix followed by an underscore.

use super::command::LayerDescriptor;

/// Key assigned to layers without a numeric prefix (mid-stack)
pub const DEFAULT_Z_INDEX: u64 = 50;

/// Extract the stacking key from a layer name.
///
/// Prefixes too large for `u64` saturate and sort last.
pub fn z_index(name: &str) -> u64 {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || name.as_bytes().get(digits) != Some(&b'_') {
        return DEFAULT_Z_INDEX;
    }

    name[..digits].parse().unwrap_or(u64::MAX)
}

/// Sort layers ascending by stacking key.
///
/// The sort is stable: layers sharing a key keep their input order.
pub fn sort_by_z_index(mut layers: Vec<LayerDescriptor>) -> Vec<LayerDescriptor> {
    layers.sort_by_key(|layer| z_index(&layer.name));
    layers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str) -> LayerDescriptor {
        LayerDescriptor {
            name: name.to_string(),
            class: "comment".to_string(),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            args: Vec::new(),
            attrs: None,
        }
    }

    fn names(layers: &[LayerDescriptor]) -> Vec<&str> {
        layers.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_prefix_extraction() {
        assert_eq!(z_index("00_bg_panel"), 0);
        assert_eq!(z_index("30_rate_dial"), 30);
        assert_eq!(z_index("105_overlay"), 105);
        assert_eq!(z_index("no_prefix_here"), DEFAULT_Z_INDEX);
        assert_eq!(z_index("30rate"), DEFAULT_Z_INDEX);
        assert_eq!(z_index("_30_rate"), DEFAULT_Z_INDEX);
        assert_eq!(z_index(""), DEFAULT_Z_INDEX);
        assert_eq!(z_index("99999999999999999999999_huge"), u64::MAX);
    }

    #[test]
    fn test_sorts_by_prefix() {
        let sorted = sort_by_z_index(vec![
            layer("50_rate_label"),
            layer("30_rate_dial"),
            layer("00_bg_panel"),
            layer("90_logo"),
        ]);
        assert_eq!(
            names(&sorted),
            ["00_bg_panel", "30_rate_dial", "50_rate_label", "90_logo"]
        );
    }

    #[test]
    fn test_unprefixed_sorts_mid_stack() {
        let sorted = sort_by_z_index(vec![
            layer("70_meter"),
            layer("no_prefix_here"),
            layer("30_dial"),
        ]);
        assert_eq!(names(&sorted), ["30_dial", "no_prefix_here", "70_meter"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let sorted = sort_by_z_index(vec![
            layer("50_b"),
            layer("unprefixed"),
            layer("50_a"),
            layer("10_x"),
        ]);
        assert_eq!(names(&sorted), ["10_x", "50_b", "unprefixed", "50_a"]);
    }
}
