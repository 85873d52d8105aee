#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is a free-text value.
pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
    },
    CommandSpec {
        command: "style",
        action: "set_style",
    },
    CommandSpec {
        command: "ratio",
        action: "set_ratio",
    },
    CommandSpec {
        command: "camera",
        action: "set_camera",
    },
    CommandSpec {
        command: "lighting",
        action: "set_lighting",
    },
    CommandSpec {
        command: "mood",
        action: "set_mood",
    },
    CommandSpec {
        command: "select",
        action: "select",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "source",
        action: "set_source",
    },
    CommandSpec {
        command: "export",
        action: "export",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "unsource",
        action: "clear_source",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "config",
        action: "show_config",
    },
    CommandSpec {
        command: "clear",
        action: "clear_history",
    },
    CommandSpec {
        command: "styles",
        action: "list_styles",
    },
    CommandSpec {
        command: "ratios",
        action: "list_ratios",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/mode",
    "/style",
    "/ratio",
    "/camera",
    "/lighting",
    "/mood",
    "/source",
    "/unsource",
    "/select",
    "/export",
    "/history",
    "/config",
    "/clear",
    "/styles",
    "/ratios",
    "/help",
    "/quit",
];
