use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Pure clap command definitions with zero business logic
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new("dsn")
                .env("DBPROBE_DSN")
                .help("<mysql|postgres>://<username>:<password>@tcp(<host>:<port>)/<database>")
                .long("dsn")
                .short('d')
                .required(true),
        )
        .arg(
            Arg::new("session")
                .default_value("default")
                .env("DBPROBE_SESSION")
                .help("Session name reported in configuration errors")
                .long("session")
                .short('s')
                .global(true),
        )
        .arg(
            Arg::new("tls-connect")
                .env("DBPROBE_TLS_CONNECT")
                .help("TLS connect mode, 'required' uses the --tls-* certificate files")
                .long("tls-connect")
                .long_help(
                    "TLS connect mode:\n\n\
                    - empty (default): no TLS\n\
                    - required: TLS with the files given by --tls-ca, --tls-cert and --tls-key\n\
                    - any other mode: credentials come from the wallet given by --tls-wallet\n\n\
                    A wallet is only accepted together with an explicit mode other than 'required'."
                )
                .value_name("MODE")
                .global(true),
        )
        .arg(
            Arg::new("tls-ca")
                .env("DBPROBE_TLS_CA")
                .help("Path to the CA certificate bundle used to verify the server")
                .long("tls-ca")
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("tls-cert")
                .env("DBPROBE_TLS_CERT")
                .help("Path to the client certificate file for mutual TLS")
                .long("tls-cert")
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("tls-key")
                .env("DBPROBE_TLS_KEY")
                .help("Path to the client private key file for mutual TLS")
                .long("tls-key")
                .long_help(
                    "Path to the client private key for mutual TLS authentication.\n\
                    PKCS#8, PKCS#1 (RSA) and SEC1 (EC) PEM keys are accepted.\n\n\
                    Example: /etc/dbprobe/client-key.pem"
                )
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("tls-wallet")
                .env("DBPROBE_TLS_WALLET")
                .help("Path to the credential wallet directory")
                .long("tls-wallet")
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("insecure-skip-verify")
                .env("DBPROBE_INSECURE_SKIP_VERIFY")
                .help("Accept any server certificate, the client certificate is still presented")
                .long("insecure-skip-verify")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .default_value("10")
                .env("DBPROBE_TIMEOUT")
                .help("Seconds to wait for a query or a handshake")
                .long("timeout")
                .short('t')
                .value_parser(clap::value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new("verbosity")
                .help("Verbosity level, repeat for more detail (-v, -vv, -vvv)")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("query")
                .about("Run a named query and print the rows as a JSON array")
                .arg(
                    Arg::new("queries")
                        .default_value("queries")
                        .env("DBPROBE_QUERIES")
                        .help("Directory of *.sql files, each file is a query named after its stem")
                        .long("queries")
                        .short('q')
                        .value_name("DIR"),
                )
                .arg(
                    Arg::new("params")
                        .help("Query name followed by its positional parameters")
                        .num_args(0..)
                        .value_name("PARAMS"),
                ),
        )
        .subcommand(
            Command::new("probe")
                .about("Perform a TLS handshake with the server and print the session metadata"),
        )
}
