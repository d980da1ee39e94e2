//! Channel message formats. Board output from the engine is relayed inside
//! fenced code blocks so Slack renders it in a monospace font.

pub fn new_game(challenger: &str, opponent: &str, board: &str) -> String {
    format!("{challenger} started a new game against {opponent}:\n```\n{board}\n```")
}

pub fn command_output(player: &str, command: &str, output: &str) -> String {
    format!("{player} attempted to `{command}`:\n```\n{output}\n```")
}

pub fn quit_notice(quitter: &str, opponent: &str) -> String {
    format!("{quitter} quit game against {opponent}")
}

pub fn info_summary(max_games: usize, games: &[(String, String)]) -> String {
    let listing = games
        .iter()
        .map(|(challenger, opponent)| format!("{challenger} vs. {opponent}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("There are currently {}/{} games:\n{}", games.len(), max_games, listing)
}
