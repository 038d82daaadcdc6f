use clap::{Arg, Command};

/// SMTP is optional: without `--smtp-host` outgoing mail is logged instead of
/// delivered, which is the local development mode.
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("smtp-host")
                .long("smtp-host")
                .help("SMTP relay host; omit to log mail instead of sending")
                .env("QUIZMASTER_SMTP_HOST"),
        )
        .arg(
            Arg::new("smtp-port")
                .long("smtp-port")
                .help("SMTP relay port")
                .default_value("587")
                .env("QUIZMASTER_SMTP_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("smtp-username")
                .long("smtp-username")
                .help("SMTP username")
                .env("QUIZMASTER_SMTP_USERNAME")
                .requires("smtp-host"),
        )
        .arg(
            Arg::new("smtp-password")
                .long("smtp-password")
                .help("SMTP password")
                .env("QUIZMASTER_SMTP_PASSWORD")
                .requires("smtp-username"),
        )
        .arg(
            Arg::new("mail-from")
                .long("mail-from")
                .help("From address for outgoing mail")
                .env("QUIZMASTER_MAIL_FROM")
                .default_value("Quiz Master <no-reply@quizmaster.local>"),
        )
}
