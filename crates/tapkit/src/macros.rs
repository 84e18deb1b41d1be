//! Assertion macros.
//!
//! Each macro takes the [`Tap`](crate::Tap) first (anything that derefs to
//! it: `&Tap`, `Arc<Tap>`), formats its description eagerly with
//! `format!`-style arguments, and records the enclosing function, file and
//! line for the failure diagnostic.

/// Name of the enclosing function, without its module path.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __type_name_of(__here);
        let name = name.strip_suffix("::__here").unwrap_or(name);
        let name = name.trim_end_matches("::{{closure}}");
        name.rsplit("::").next().unwrap_or(name)
    }};
}

/// [`Callsite`](crate::Callsite) of the macro invocation.
#[macro_export]
macro_rules! callsite {
    () => {
        $crate::Callsite::new(
            ::std::option::Option::Some($crate::__function_name!()),
            ::std::file!(),
            ::std::line!(),
        )
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record {
    ($tap:expr, $passed:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.record(
            $passed,
            $crate::format::describe(::std::format_args!($($arg)+)),
            $crate::callsite!(),
        )
    }};
}

/// Pass when the condition is true. Without a description the condition's
/// source text is used.
#[macro_export]
macro_rules! ok {
    ($tap:expr, $cond:expr $(,)?) => {
        $crate::__record!($tap, $cond, "{}", ::std::stringify!($cond))
    };
    ($tap:expr, $cond:expr, $($arg:tt)+) => {
        $crate::__record!($tap, $cond, $($arg)+)
    };
}

#[macro_export]
macro_rules! pass {
    ($tap:expr, $($arg:tt)+) => {
        $crate::__record!($tap, true, $($arg)+)
    };
}

#[macro_export]
macro_rules! fail {
    ($tap:expr, $($arg:tt)+) => {
        $crate::__record!($tap, false, $($arg)+)
    };
}

/// Pass when `got == expected`.
#[macro_export]
macro_rules! is_eq {
    ($tap:expr, $got:expr, $expected:expr, $($arg:tt)+) => {
        $crate::__record!($tap, ($got) == ($expected), $($arg)+)
    };
}

/// Pass when `got != unexpected`.
#[macro_export]
macro_rules! is_ne {
    ($tap:expr, $got:expr, $unexpected:expr, $($arg:tt)+) => {
        $crate::__record!($tap, ($got) != ($unexpected), $($arg)+)
    };
}

/// Pass when two string-like values hold the same text.
#[macro_export]
macro_rules! eq_str {
    ($tap:expr, $got:expr, $expected:expr, $($arg:tt)+) => {
        $crate::__record!(
            $tap,
            ::std::convert::AsRef::<str>::as_ref(&$got)
                == ::std::convert::AsRef::<str>::as_ref(&$expected),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! ne_str {
    ($tap:expr, $got:expr, $unexpected:expr, $($arg:tt)+) => {
        $crate::__record!(
            $tap,
            ::std::convert::AsRef::<str>::as_ref(&$got)
                != ::std::convert::AsRef::<str>::as_ref(&$unexpected),
            $($arg)+
        )
    };
}

/// Pass when both pointers address the same location.
#[macro_export]
macro_rules! eq_ptr {
    ($tap:expr, $got:expr, $expected:expr, $($arg:tt)+) => {
        $crate::__record!($tap, ::std::ptr::addr_eq($got, $expected), $($arg)+)
    };
}

#[macro_export]
macro_rules! ne_ptr {
    ($tap:expr, $got:expr, $unexpected:expr, $($arg:tt)+) => {
        $crate::__record!($tap, !::std::ptr::addr_eq($got, $unexpected), $($arg)+)
    };
}

/// Pass when the `Option` is `None`.
#[macro_export]
macro_rules! is_none {
    ($tap:expr, $value:expr, $($arg:tt)+) => {
        $crate::__record!($tap, ::std::option::Option::is_none(&$value), $($arg)+)
    };
}

/// Pass when the `Option` is `Some`.
#[macro_export]
macro_rules! is_some {
    ($tap:expr, $value:expr, $($arg:tt)+) => {
        $crate::__record!($tap, ::std::option::Option::is_some(&$value), $($arg)+)
    };
}

/// Pass when the block returns normally.
///
/// A surviving block runs twice: once in a forked child, then again in this
/// process. See [`Tap::try_check_isolated`](crate::Tap::try_check_isolated).
#[macro_export]
macro_rules! lives {
    ($tap:expr, $block:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.check_isolated(
            $crate::Expectation::Lives,
            $crate::format::describe(::std::format_args!($($arg)+)),
            $crate::callsite!(),
            || {
                $block;
            },
        )
    }};
}

/// Pass when the block terminates its process abnormally.
#[macro_export]
macro_rules! dies {
    ($tap:expr, $block:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.check_isolated(
            $crate::Expectation::Dies,
            $crate::format::describe(::std::format_args!($($arg)+)),
            $crate::callsite!(),
            || {
                $block;
            },
        )
    }};
}

/// Emit `count` skip lines.
#[macro_export]
macro_rules! skip {
    ($tap:expr, $count:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.skip($count, $crate::format::describe(::std::format_args!($($arg)+)))
    }};
}

#[macro_export]
macro_rules! diag {
    ($tap:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.diag($crate::format::describe(::std::format_args!($($arg)+)))
    }};
}

#[macro_export]
macro_rules! todo_start {
    ($tap:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.todo_start($crate::format::describe(::std::format_args!($($arg)+)))
    }};
}

#[macro_export]
macro_rules! bail_out {
    ($tap:expr, $($arg:tt)+) => {{
        let tap: &$crate::Tap = &$tap;
        tap.bail_out($crate::format::describe(::std::format_args!($($arg)+)))
    }};
}
