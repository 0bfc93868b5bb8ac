//! Free-standing wiring helpers.

use crate::{
    subscription::Subscription,
    unit::{Source, Target},
    value::Value,
};

/// Trigger `to` with every payload of `from`.
///
/// Both units must belong to the same kernel.
///
/// ```rust,ignore
/// let submit = kernel.create_event::<String>();
/// let draft = kernel.create_store(String::new());
/// rivulet::forward(&submit, &draft);
/// ```
pub fn forward<T: Value>(from: &impl Source<T>, to: &impl Target<T>) -> Subscription {
    debug_assert!(
        from.kernel().same_kernel(to.kernel()),
        "forward between units of different kernels"
    );
    from.kernel().forward(from, to)
}
