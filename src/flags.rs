//! Per-context feature switches.
//!
//! Three independent on/off flags travel with a [`Context`]: trace-header
//! injection on outbound calls, metric events, and call logging. A flag that
//! was never set reads as disabled; the newest setting in a lineage wins.

use crate::context::Context;

#[derive(Clone, Copy)]
struct TraceFlag(bool);

#[derive(Clone, Copy)]
struct MetricFlag(bool);

#[derive(Clone, Copy)]
struct LogFlag(bool);

pub fn enable_trace(ctx: &Context) -> Context {
    ctx.with_value(TraceFlag(true))
}

pub fn disable_trace(ctx: &Context) -> Context {
    ctx.with_value(TraceFlag(false))
}

/// Whether outbound calls made with `ctx` should carry a `traceparent`.
pub fn has_enabled_trace(ctx: &Context) -> bool {
    ctx.value::<TraceFlag>().is_some_and(|f| f.0)
}

pub fn enable_metric(ctx: &Context) -> Context {
    ctx.with_value(MetricFlag(true))
}

pub fn disable_metric(ctx: &Context) -> Context {
    ctx.with_value(MetricFlag(false))
}

pub fn has_enabled_metric(ctx: &Context) -> bool {
    ctx.value::<MetricFlag>().is_some_and(|f| f.0)
}

pub fn enable_log(ctx: &Context) -> Context {
    ctx.with_value(LogFlag(true))
}

pub fn disable_log(ctx: &Context) -> Context {
    ctx.with_value(LogFlag(false))
}

pub fn has_enabled_log(ctx: &Context) -> bool {
    ctx.value::<LogFlag>().is_some_and(|f| f.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_means_disabled() {
        let ctx = Context::background();
        assert!(!has_enabled_trace(&ctx));
        assert!(!has_enabled_metric(&ctx));
        assert!(!has_enabled_log(&ctx));
    }

    #[test]
    fn flags_are_independent() {
        let ctx = enable_metric(&Context::background());
        assert!(has_enabled_metric(&ctx));
        assert!(!has_enabled_trace(&ctx));
        assert!(!has_enabled_log(&ctx));
    }

    #[test]
    fn newest_setting_wins() {
        let on = enable_trace(&Context::background());
        let off = disable_trace(&on);
        assert!(has_enabled_trace(&on));
        assert!(!has_enabled_trace(&off));
        assert!(has_enabled_log(&enable_log(&disable_log(&off))));
    }
}
