use super::help_text;
use super::SlashCommand;

#[test]
fn it_parse_empty_string() {
    let text = "";
    assert!(SlashCommand::parse(text).is_none());
}
#[test]
fn it_parse_space_only() {
    let text = " ";
    assert!(SlashCommand::parse(text).is_none());
}
#[test]
fn it_parse_single_slash() {
    let text = "/";
    assert!(SlashCommand::parse(text).is_none());
}
#[test]
fn it_parse_invalid_prefix() {
    let text = "!q";
    assert!(SlashCommand::parse(text).is_none());
}
#[test]
fn it_parse_plain_message() {
    let text = "what is the leave policy?";
    assert!(SlashCommand::parse(text).is_none());
}
#[test]
fn it_parse_valid_prefix() {
    let text = "/q";
    let cmd = SlashCommand::parse(text);
    assert!(cmd.is_some());
    assert_eq!(cmd.unwrap().command, "/q");
}

#[test]
fn it_is_short_quit() {
    let cmd = SlashCommand::parse("/q").unwrap();
    assert!(cmd.is_quit());
}
#[test]
fn it_is_exit() {
    let cmd = SlashCommand::parse("/exit").unwrap();
    assert!(cmd.is_quit());
}
#[test]
fn it_is_not_is_quit() {
    let cmd = SlashCommand::parse("/new").unwrap();
    assert!(!cmd.is_quit());
}

#[test]
fn it_is_short_new_session() {
    let cmd = SlashCommand::parse("/n").unwrap();
    assert!(cmd.is_new_session());
}
#[test]
fn it_is_list_sessions() {
    let cmd = SlashCommand::parse("/sessions").unwrap();
    assert!(cmd.is_list_sessions());
}

#[test]
fn it_is_open_session_with_id() {
    let cmd = SlashCommand::parse("/open session-abc").unwrap();
    assert!(cmd.is_open_session());
    assert_eq!(cmd.argument(), Some("session-abc".to_string()));
}
#[test]
fn it_is_open_session_without_id() {
    let cmd = SlashCommand::parse("/o").unwrap();
    assert!(cmd.is_open_session());
    assert_eq!(cmd.argument(), None);
}

#[test]
fn it_is_delete_session() {
    let cmd = SlashCommand::parse("/d session-abc").unwrap();
    assert!(cmd.is_delete_session());
    assert!(!cmd.is_open_session());
}

#[test]
fn it_is_upload_with_spaced_path() {
    let cmd = SlashCommand::parse("/upload ./docs/hr policy.md").unwrap();
    assert!(cmd.is_upload());
    assert_eq!(cmd.argument(), Some("./docs/hr policy.md".to_string()));
}

#[test]
fn it_is_help() {
    let cmd = SlashCommand::parse("/help").unwrap();
    assert!(cmd.is_help());
}
#[test]
fn it_is_not_help() {
    let cmd = SlashCommand::parse("/s").unwrap();
    assert!(!cmd.is_help());
}

#[test]
fn it_lists_every_command_in_help() {
    let text = help_text();
    for command in ["/new", "/sessions", "/open", "/delete", "/upload", "/help", "/quit"] {
        assert!(text.contains(command));
        assert!(SlashCommand::parse(command).is_some());
    }
}
