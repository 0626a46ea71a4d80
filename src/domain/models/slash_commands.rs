#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /new (/n) - Starts a new, empty session and makes it active.
- /sessions (/s) - Lists the sessions known to the backend.
- /open (/o) [SESSION_ID] - Switches to a session and loads its history.
- /delete (/d) [SESSION_ID] - Deletes a session from the backend.
- /upload (/u) [PATH] - Uploads a .txt or .md file to the knowledge base.
- /help (/h) - Shows this help text.
- /quit (/q) - Exits.
"#;

    return text.trim().to_string();
}

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }
        let prefix = args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit()
            || cmd.is_new_session()
            || cmd.is_list_sessions()
            || cmd.is_open_session()
            || cmd.is_delete_session()
            || cmd.is_upload()
            || cmd.is_help()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Arguments joined back together, so file paths with spaces survive.
    pub fn argument(&self) -> Option<String> {
        let joined = self.args.join(" ");
        if joined.is_empty() {
            return None;
        }

        return Some(joined);
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_new_session(&self) -> bool {
        return ["/n", "/new"].contains(&self.command.as_str());
    }

    pub fn is_list_sessions(&self) -> bool {
        return ["/s", "/sessions"].contains(&self.command.as_str());
    }

    pub fn is_open_session(&self) -> bool {
        return ["/o", "/open"].contains(&self.command.as_str());
    }

    pub fn is_delete_session(&self) -> bool {
        return ["/d", "/delete"].contains(&self.command.as_str());
    }

    pub fn is_upload(&self) -> bool {
        return ["/u", "/upload"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }
}
