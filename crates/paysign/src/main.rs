use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use paysign::alipay::{PUBLIC_KEY_SN, encode_order_string};
use paysign::keys::{
    derive_root_chain_identifier, load_private_key, load_public_key, parse_certificate,
};
use paysign::wxpay::encode_xml;
use paysign::{
    Md5Signer, ParamSigner, ParameterSet, PublicKeyRegistry, ResponseVerifier, RsaSigner,
    SignType, WxClient, WxPayConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    #[value(name = "RSA")]
    Rsa,
    #[value(name = "RSA2")]
    Rsa2,
}

impl From<Algorithm> for SignType {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Rsa => SignType::Rsa,
            Algorithm::Rsa2 => SignType::Rsa2,
        }
    }
}

#[derive(Parser)]
#[clap(version, about = "Payment gateway request signing and response verification")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the serial identifier of a certificate.
    CertSn { cert: PathBuf },
    /// Print the joined serial identifiers of the RSA roots in a bundle.
    RootCertSn { bundle: PathBuf },
    /// Sign a parameter set with an RSA private key and print it as JSON.
    Sign {
        #[clap(long, env = "PAYSIGN_PRIVATE_KEY")]
        private_key: PathBuf,
        #[clap(long, env = "PAYSIGN_SIGN_TYPE", default_value = "RSA2")]
        sign_type: Algorithm,
        /// Print a form-urlencoded order string instead of JSON.
        #[clap(long)]
        order_string: bool,
        /// `key=value`, repeatable.
        #[clap(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Verify an asynchronous notification given as its fields.
    VerifyNotify {
        #[clap(flatten)]
        keys: GatewayKeys,
        #[clap(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Verify a raw response body and print the signed content.
    VerifyResponse {
        #[clap(flatten)]
        keys: GatewayKeys,
        /// Dotted gateway method the response belongs to.
        #[clap(long)]
        method: String,
        /// Response body file, `-` for stdin.
        body: PathBuf,
    },
    /// Sign a parameter set with the MD5 scheme and print the XML body.
    WxSign {
        #[clap(long, env = "WXPAY_MD5_KEY")]
        md5_key: String,
        #[clap(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Verify an MD5-signed XML response or notification.
    WxVerify {
        #[clap(long, env = "WXPAY_MD5_KEY")]
        md5_key: String,
        /// Response body file, `-` for stdin.
        body: PathBuf,
    },
}

#[derive(clap::Args)]
struct GatewayKeys {
    /// Gateway public key, registered under the default serial.
    #[clap(long, env = "PAYSIGN_PUBLIC_KEY")]
    public_key: Option<PathBuf>,
    /// Gateway certificate; its key is registered under its serial.
    #[clap(long = "gateway-cert")]
    gateway_certs: Vec<PathBuf>,
    #[clap(long, env = "PAYSIGN_SIGN_TYPE", default_value = "RSA2")]
    sign_type: Algorithm,
}

impl GatewayKeys {
    fn verifier(&self) -> Result<ResponseVerifier> {
        let mut registry = match &self.public_key {
            Some(path) => Some(PublicKeyRegistry::new(
                PUBLIC_KEY_SN,
                load_public_key(&read_text(path)?)
                    .with_context(|| format!("loading {}", path.display()))?,
            )),
            None => None,
        };

        for path in &self.gateway_certs {
            let record = parse_certificate(&read_text(path)?)
                .with_context(|| format!("parsing {}", path.display()))?;
            let Some(key) = record.public_key else {
                bail!("{} does not carry an RSA key", path.display());
            };
            registry = Some(match registry.take() {
                Some(mut registry) => {
                    registry.register(record.serial_id, key);
                    registry
                }
                None => PublicKeyRegistry::new(record.serial_id, key),
            });
        }

        let Some(registry) = registry else {
            bail!("either --public-key or --gateway-cert is required");
        };
        Ok(ResponseVerifier::new(
            Arc::new(registry),
            self.sign_type.into(),
        ))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::CertSn { cert } => {
            let record = parse_certificate(&read_text(&cert)?)
                .with_context(|| format!("parsing {}", cert.display()))?;
            println!("{}", record.serial_id);
        }
        Command::RootCertSn { bundle } => {
            let serials = derive_root_chain_identifier(&read_text(&bundle)?)
                .with_context(|| format!("parsing {}", bundle.display()))?;
            println!("{serials}");
        }
        Command::Sign {
            private_key,
            sign_type,
            order_string,
            params,
        } => {
            let key = load_private_key(&read_text(&private_key)?)
                .with_context(|| format!("loading {}", private_key.display()))?;
            let signer = RsaSigner::new(key, sign_type.into());
            let mut params: ParameterSet = params.into_iter().collect();
            let sign = signer.sign_params(&params)?;
            params.insert("sign".into(), sign);
            if order_string {
                println!("{}", encode_order_string(&params)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&params)?);
            }
        }
        Command::VerifyNotify { keys, params } => {
            let params: ParameterSet = params.into_iter().collect();
            keys.verifier()?
                .verify_notification(&params)
                .context("notification rejected")?;
            println!("ok");
        }
        Command::VerifyResponse { keys, method, body } => {
            let verifier = keys.verifier()?;
            let body = read_text(&body)?;
            let verified = verifier
                .verify_response(&body, &method)
                .context("response rejected")?;
            if let Some(error) = verified.gateway_error() {
                tracing::info!(%error, "gateway reported a business failure");
            }
            println!("{}", verified.content());
        }
        Command::WxSign { md5_key, params } => {
            let signer = Md5Signer::new(md5_key);
            let mut params: ParameterSet = params.into_iter().collect();
            let sign = signer.sign_params(&params)?;
            params.insert("sign".into(), sign);
            println!("{}", encode_xml(&params)?);
        }
        Command::WxVerify { md5_key, body } => {
            let client = WxClient::new(&WxPayConfig {
                md5_key,
                ..Default::default()
            });
            let fields = client
                .verify_response(&read_text(&body)?)
                .context("response rejected")?;
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }

    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
