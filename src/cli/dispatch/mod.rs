use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        frontend_url: matches
            .get_one("frontend-url")
            .map_or_else(|| "http://localhost:3000".to_string(), |s: &String| s.to_string()),
        enc_key: matches
            .get_one::<String>("enc-key")
            .map(|s| SecretString::from(s.to_string()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --enc-key"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "centinela",
            "--port",
            "8443",
            "--enc-key",
            "sealing-secret",
        ]);
        let Action::Server {
            port,
            frontend_url,
            enc_key,
        } = handler(&matches)?;
        assert_eq!(port, 8443);
        assert_eq!(frontend_url, "http://localhost:3000");
        assert_eq!(enc_key.expose_secret(), "sealing-secret");
        Ok(())
    }
}
