#[macro_export]
macro_rules! eeprintln {
    ($($arg:tt)*) => {{
        if *$crate::print::IS_GIT_BASH {
            println!("{}", format_args!($($arg)*));
        } else {
            eprintln!("{}", format_args!($($arg)*));
        }
    }};
}

/// Print an informational message.
/// Saved to a log file.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if $crate::print::is_print() {
            println!("{} {}", owo_colors::OwoColorize::yellow(&"[info]"), format_args!($($arg)*));
        }
        $crate::print::print_to_file(&format!("{}", format_args!($($arg)*)), $crate::print::LogType::Info);
    }};
}

/// Print a warning: something went wrong,
/// but the current operation carries on.
/// Saved to a log file.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        if $crate::print::is_print() {
            $crate::eeprintln!("{} {}", owo_colors::OwoColorize::bright_magenta(&"[warn]"), format_args!($($arg)*));
        }
        $crate::print::print_to_file(&format!("{}", format_args!($($arg)*)), $crate::print::LogType::Warn);
    }};
}

/// Print an error message.
/// Saved to a log file.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {{
        if $crate::print::is_print() {
            $crate::eeprintln!("{} {}", owo_colors::OwoColorize::red(&"[error]"), format_args!($($arg)*));
        }
        $crate::print::print_to_file(&format!("{}", format_args!($($arg)*)), $crate::print::LogType::Error);
    }};
}

/// Print a point message, i.e. a small step in some process.
/// Saved to a log file.
#[macro_export]
macro_rules! pt {
    ($($arg:tt)*) => {{
        if $crate::print::is_print() {
            println!("{} {}", owo_colors::OwoColorize::bold(&"-"), format_args!($($arg)*));
        }
        $crate::print::print_to_file(&format!("{}", format_args!($($arg)*)), $crate::print::LogType::Point);
    }};
}
