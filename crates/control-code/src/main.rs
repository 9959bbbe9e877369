use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use control_code::{
    Charset, ControlCodeError, FieldSet, PrivateKeyMaterial, canonical_hash,
    self_test_with_key_file, sign_with_key_file, verify_with_certificate_file,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "control-code", version, about = "Sign and verify payment control codes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical string the control code is computed over
    Hash {
        #[command(flatten)]
        input: FieldInput,
    },
    /// Print the base64 control code for the given fields
    Sign {
        #[command(flatten)]
        input: FieldInput,
        #[command(flatten)]
        key: PrivateKeyArgs,
    },
    /// Check a control code against the counterparty certificate
    Verify {
        #[command(flatten)]
        input: FieldInput,
        #[clap(long)]
        signature: String,
        #[clap(long, env = "CONTROL_CODE_CERTIFICATE")]
        certificate: PathBuf,
    },
    /// Sign and verify with a combined key + certificate file
    SelfTest {
        #[command(flatten)]
        input: FieldInput,
        #[command(flatten)]
        key: PrivateKeyArgs,
    },
}

#[derive(Args)]
struct FieldInput {
    /// Charset label, e.g. UTF-8 or windows-1257
    #[clap(long, env = "CONTROL_CODE_ENCODING", default_value = "UTF-8")]
    encoding: String,
    /// Field in signing order; repeat for every field
    #[clap(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,
    /// JSON object of fields, signed in document order before any --field
    #[clap(long, value_name = "PATH")]
    fields_json: Option<PathBuf>,
}

#[derive(Args)]
struct PrivateKeyArgs {
    #[clap(long, env = "CONTROL_CODE_PRIVATE_KEY")]
    private_key: PathBuf,
    #[clap(long, env = "CONTROL_CODE_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
}

const STATUS_VALID: u8 = 0;
const STATUS_INVALID: u8 = 1;
const STATUS_ERROR: u8 = 2;
const STATUS_BAD_INPUT: u8 = 3;

impl FieldInput {
    fn charset(&self) -> Result<Charset> {
        Ok(Charset::for_label(&self.encoding)?)
    }

    fn load(&self) -> Result<FieldSet> {
        let mut fields = match &self.fields_json {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str::<FieldSet>(&json)
                    .with_context(|| format!("parsing fields from {}", path.display()))?
            }
            None => FieldSet::new(),
        };
        fields.extend(self.fields.iter().cloned());
        if fields.is_empty() {
            bail!("no fields given, use --field NAME=VALUE or --fields-json PATH");
        }
        Ok(fields)
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    if name.is_empty() {
        return Err("field name must not be empty".to_string());
    }
    Ok((name.to_string(), value.to_string()))
}

fn status(valid: bool) -> u8 {
    if valid { STATUS_VALID } else { STATUS_INVALID }
}

/// Exit status for a failed command: field data at fault or anything else.
fn error_status(e: &anyhow::Error) -> u8 {
    let bad_input = e
        .downcast_ref::<ControlCodeError>()
        .is_some_and(ControlCodeError::is_input_error);
    if bad_input { STATUS_BAD_INPUT } else { STATUS_ERROR }
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Command::Hash { input } => {
            let charset = input.charset()?;
            let fields = input.load()?;
            println!("{}", canonical_hash(&fields, charset)?);
            Ok(STATUS_VALID)
        }
        Command::Sign { input, key } => {
            let charset = input.charset()?;
            let fields = input.load()?;
            let control_code = sign_with_key_file(
                &fields,
                charset,
                &key.private_key,
                key.passphrase.as_deref(),
            )
            .context("generating control code")?;
            println!("{control_code}");
            Ok(STATUS_VALID)
        }
        Command::Verify {
            input,
            signature,
            certificate,
        } => {
            let charset = input.charset()?;
            let fields = input.load()?;
            let valid = verify_with_certificate_file(&fields, &signature, &certificate, charset)
                .context("verifying control code")?;
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(status(valid))
        }
        Command::SelfTest { input, key } => {
            let charset = input.charset()?;
            let fields = input.load()?;
            let passphrase = key.passphrase.as_deref();
            let passed = self_test_with_key_file(&fields, &key.private_key, charset, passphrase)
                    .context("running control code self-test")?;

            let pem = fs::read(&key.private_key)
                .with_context(|| format!("reading {}", key.private_key.display()))?;
            let fingerprint = PrivateKeyMaterial::from_pem(&pem, passphrase)?
                .public_key()
                .fingerprint()?;
            println!("key fingerprint: {fingerprint}");
            println!("self-test: {}", if passed { "ok" } else { "mismatch" });
            Ok(status(passed))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(error_status(&e))
        }
    }
}
