// SPDX-License-Identifier: MIT

use std::io::Write;

use env_logger::{Builder, Env};

/// Default filter for a `-v` count; `-q` wins over any count.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Console logger with the `[rex]` prefix. `RUST_LOG` overrides the level.
pub fn init(verbose: u8, quiet: bool) {
    Builder::from_env(Env::default().default_filter_or(level_for(verbose, quiet)))
        .format(|buf, record| {
            let level = match record.level() {
                log::Level::Error => "error: ",
                log::Level::Warn => "warning: ",
                _ => "",
            };
            writeln!(buf, "[rex] {level}{}", record.args())
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(level_for(0, false), "info");
        assert_eq!(level_for(1, false), "debug");
        assert_eq!(level_for(5, false), "trace");
        assert_eq!(level_for(3, true), "error");
    }
}
