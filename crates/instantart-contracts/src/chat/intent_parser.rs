use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, NO_ARG_COMMANDS, SINGLE_PATH_COMMANDS, TEXT_ARG_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Parses one shell line. Slash commands configure the session; anything
/// else is a prompt to submit.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, TEXT_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("value".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("submit", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn plain_text_is_submitted_as_prompt() {
        let intent = parse_intent("  a red fox in snow ");
        assert_eq!(intent.action, "submit");
        assert_eq!(intent.prompt.as_deref(), Some("a red fox in snow"));
    }

    #[test]
    fn config_commands_keep_free_text_value() {
        let camera = parse_intent("/camera 50mm prime, f/1.8");
        assert_eq!(camera.action, "set_camera");
        assert_eq!(camera.command_args["value"], json!("50mm prime, f/1.8"));

        let ratio = parse_intent("/RATIO 16:9");
        assert_eq!(ratio.action, "set_ratio");
        assert_eq!(ratio.arg("value"), Some("16:9"));

        let mood = parse_intent("/mood");
        assert_eq!(mood.action, "set_mood");
        assert_eq!(mood.arg("value"), Some(""));
    }

    #[test]
    fn path_commands_accept_quoted_paths() {
        let source = parse_intent("/source \"/tmp/my photo.png\"");
        assert_eq!(source.action, "set_source");
        assert_eq!(source.command_args["path"], json!("/tmp/my photo.png"));

        let export = parse_intent("/export");
        assert_eq!(export.action, "export");
        assert_eq!(export.arg("path"), Some(""));
    }

    #[test]
    fn no_arg_commands() {
        assert_eq!(parse_intent("/history").action, "history");
        assert_eq!(parse_intent("/clear").action, "clear_history");
        assert_eq!(parse_intent("/unsource").action, "clear_source");
        assert_eq!(parse_intent("/help").action, "help");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
