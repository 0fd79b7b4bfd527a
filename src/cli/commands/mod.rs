use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("centinela")
        .about("Account security and authentication service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("CENTINELA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("frontend-url")
                .short('f')
                .long("frontend-url")
                .help("Frontend base URL, used as the allowed CORS origin")
                .default_value("http://localhost:3000")
                .env("CENTINELA_FRONTEND_URL"),
        )
        .arg(
            Arg::new("enc-key")
                .short('k')
                .long("enc-key")
                .help("Secret used to derive the key that seals stored verification codes")
                .env("CENTINELA_ENC_KEY")
                .required(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("CENTINELA_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "centinela");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Account security and authentication service"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_port_and_frontend() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "centinela",
            "--port",
            "8443",
            "--frontend-url",
            "https://compare.example.com",
            "--enc-key",
            "sealing-secret",
        ]);

        assert_eq!(matches.get_one::<u16>("port").map(|s| *s), Some(8443));
        assert_eq!(
            matches
                .get_one::<String>("frontend-url")
                .map(|s| s.to_string()),
            Some("https://compare.example.com".to_string())
        );
        assert_eq!(
            matches.get_one::<String>("enc-key").map(|s| s.to_string()),
            Some("sealing-secret".to_string())
        );
    }

    #[test]
    fn test_defaults() {
        let command = new();
        let matches = command.get_matches_from(vec!["centinela", "--enc-key", "sealing-secret"]);

        assert_eq!(matches.get_one::<u16>("port").map(|s| *s), Some(8080));
        assert_eq!(
            matches
                .get_one::<String>("frontend-url")
                .map(|s| s.to_string()),
            Some("http://localhost:3000".to_string())
        );
    }

    #[test]
    fn test_enc_key_is_required() {
        let command = new();
        let result = command.try_get_matches_from(vec!["centinela"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            let mut args = vec![
                "centinela".to_string(),
                "--enc-key".to_string(),
                "sealing-secret".to_string(),
            ];

            // Add the appropriate number of "-v" flags based on the index
            if index > 0 {
                let v = format!("-{}", "v".repeat(index));
                args.push(v);
            }

            let command = new();

            let matches = command.get_matches_from(args);

            assert_eq!(
                matches.get_one::<u8>("verbosity").map(|s| *s),
                Some(index as u8)
            );
        }
    }
}
