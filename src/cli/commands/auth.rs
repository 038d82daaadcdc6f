use clap::{Arg, ArgAction, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("HMAC secret for signing access tokens")
                .env("QUIZMASTER_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("frontend-url")
                .long("frontend-url")
                .help("Origin of the web frontend, used for CORS and reset links")
                .env("QUIZMASTER_FRONTEND_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new("production")
                .long("production")
                .help("Mark refresh cookies as Secure")
                .env("QUIZMASTER_PRODUCTION")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("access-token-ttl")
                .long("access-token-ttl")
                .help("Access token lifetime in seconds")
                .default_value("900")
                .env("QUIZMASTER_ACCESS_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("refresh-token-ttl")
                .long("refresh-token-ttl")
                .help("Refresh token lifetime in seconds")
                .default_value("604800")
                .env("QUIZMASTER_REFRESH_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("otp-ttl")
                .long("otp-ttl")
                .help("Password reset OTP lifetime in seconds")
                .default_value("300")
                .env("QUIZMASTER_OTP_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
