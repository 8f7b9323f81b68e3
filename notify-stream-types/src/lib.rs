//! Types shared by `notify-stream` and its consumers.

#![deny(missing_docs)]

pub mod event;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_impl() {
        macro_rules! assert_debug_impl {
            ($t:ty) => {{
                #[allow(dead_code)]
                trait NeedsDebug: std::fmt::Debug {}
                impl NeedsDebug for $t {}
            }};
        }

        assert_debug_impl!(event::Event);
        assert_debug_impl!(event::Op);
    }
}
