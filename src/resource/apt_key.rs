//! Keys managed by apt-key.
//!
//! A key can come from a keyserver or from a remote key file fetched over
//! HTTP and staged through a temporary file. apt-key writes its
//! diagnostics to stderr, and mutations here treat any stderr output as
//! failure - the tool exits 0 for some soft errors.

use std::io::Write;
use std::sync::LazyLock;

use converge::{Error, ExecRequest, Executor, Options, Resource, Result, text};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A key in the apt keyring, addressed by its short key id.
pub struct AptKey<'a> {
    exec: &'a dyn Executor,
    key_id: String,
}

/// Observed key state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    /// Short key identifier
    pub key_id: String,
    /// Key holder identity from the keyring's uid line, empty when the
    /// listing carries none
    pub name: String,
    /// ASCII-armored public key as exported by apt-key
    pub public_key: String,
}

/// Options for adding a key.
///
/// At least one source must be given: a keyserver to receive the key id
/// from, or the URL of a public key file. When both are set, both are
/// applied.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Keyserver to obtain the key from
    pub key_server: String,
    /// URL of a public key file
    pub remote_key_file: String,
}

impl Options for CreateOpts {}

impl<'a> AptKey<'a> {
    pub fn new(exec: &'a dyn Executor, key_id: impl Into<String>) -> Self {
        Self {
            exec,
            key_id: key_id.into(),
        }
    }
}

impl Resource for AptKey<'_> {
    type State = KeyState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = ();

    const TYPE: &'static str = "AptKey";

    fn read(&self) -> Result<KeyState> {
        log::debug!("reading key {}", self.key_id);

        let result = self
            .exec
            .exec(&ExecRequest::new(format!("apt-key export {}", self.key_id)))?;

        if result.stdout.is_empty() {
            return Err(Error::not_found(Self::TYPE, &self.key_id));
        }

        let listing = self.exec.exec(&ExecRequest::new("apt-key list"))?;

        Ok(KeyState {
            key_id: self.key_id.clone(),
            name: parse_key_name(&listing.stdout, &self.key_id).unwrap_or_default(),
            public_key: result.stdout,
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("adding key {}", self.key_id);
        let opts = opts.build()?;

        // Cross-field invariant the validator does not cover.
        if opts.key_server.is_empty() && opts.remote_key_file.is_empty() {
            return Err(Error::execution(
                "one of KeyServer or RemoteKeyFile is required",
            ));
        }

        if !opts.remote_key_file.is_empty() {
            let key = fetch_remote_key(&opts.remote_key_file)?;

            let mut staged = tempfile::NamedTempFile::new()?;
            staged.write_all(key.as_bytes())?;
            staged.flush()?;

            let result = self.exec.exec(&ExecRequest::new(format!(
                "apt-key add {}",
                staged.path().display()
            )))?;

            if !result.stderr.is_empty() {
                return Err(Error::execution_with_stderr("unable to add key", result.stderr));
            }
        }

        if !opts.key_server.is_empty() {
            let result = self.exec.exec(&ExecRequest::new(format!(
                "apt-key adv --keyserver {} --recv-keys {}",
                opts.key_server, self.key_id
            )))?;

            if !result.stderr.is_empty() {
                return Err(Error::execution_with_stderr("unable to add key", result.stderr));
            }
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting key {}", self.key_id);

        let result = self
            .exec
            .exec(&ExecRequest::new(format!("apt-key del {}", self.key_id)))?;

        if !result.stderr.is_empty() {
            return Err(Error::execution_with_stderr(
                "unable to delete key",
                result.stderr,
            ));
        }

        Ok(())
    }
}

/// List every key in the apt keyring.
pub fn list(exec: &dyn Executor) -> Result<Vec<KeyState>> {
    log::debug!("listing keys via apt-key list");

    let result = exec.exec(&ExecRequest::new("apt-key list"))?;

    parse_key_listing(&result.stdout)
        .into_iter()
        .map(|key_id| AptKey::new(exec, key_id).read())
        .collect()
}

static PUB_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pub.+/(.+) [0-9-]+$").unwrap());
static UID_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^uid\s+(.+)$").unwrap());

/// Extract short key ids from `apt-key list` output, in listing order.
fn parse_key_listing(listing: &str) -> Vec<String> {
    text::capture_lines(&PUB_LINE_RE, listing)
}

/// Extract a key's holder identity: the first uid line following the pub
/// line that carries `key_id`.
fn parse_key_name(listing: &str, key_id: &str) -> Option<String> {
    let mut in_key = false;

    for line in listing.lines() {
        if let Some(id) = text::capture(&PUB_LINE_RE, line) {
            in_key = id == key_id;
            continue;
        }
        if in_key && let Some(name) = text::capture(&UID_LINE_RE, line) {
            return Some(name);
        }
    }

    None
}

fn fetch_remote_key(url: &str) -> Result<String> {
    let agent = ureq::Agent::new_with_defaults();

    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| Error::execution(format!("failed to fetch key from {url}: {e}")))?;

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::execution(format!("failed to read key body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::testing::FakeExecutor;

    const LISTING: &str = "/etc/apt/trusted.gpg\n\
                           --------------------\n\
                           pub   4096R/1655A0AB 2014-06-13\n\
                           uid                  Node Source <gpg@nodesource.com>\n\
                           sub   4096R/AA01DA2C 2014-06-13\n\
                           \n\
                           pub   1024D/437D05B5 2004-09-12\n\
                           uid                  Ubuntu Archive\n";

    #[test]
    fn test_parse_key_listing_two_keys_in_order() {
        assert_eq!(parse_key_listing(LISTING), vec!["1655A0AB", "437D05B5"]);
    }

    #[test]
    fn test_parse_key_listing_malformed_yields_nothing() {
        assert!(parse_key_listing("not a keyring at all\n").is_empty());
    }

    #[test]
    fn test_parse_key_name_pairs_uid_with_its_key() {
        assert_eq!(
            parse_key_name(LISTING, "1655A0AB").as_deref(),
            Some("Node Source <gpg@nodesource.com>")
        );
        assert_eq!(
            parse_key_name(LISTING, "437D05B5").as_deref(),
            Some("Ubuntu Archive")
        );
        assert_eq!(parse_key_name(LISTING, "DEADBEEF"), None);
    }

    #[test]
    fn test_read_carries_holder_name() {
        let exec = FakeExecutor::new()
            .respond_stdout(
                "apt-key export 1655A0AB",
                "-----BEGIN PGP PUBLIC KEY BLOCK-----\n...\n",
            )
            .respond_stdout("apt-key list", LISTING);

        let state = AptKey::new(&exec, "1655A0AB").read().unwrap();
        assert_eq!(state.name, "Node Source <gpg@nodesource.com>");
        assert!(state.public_key.starts_with("-----BEGIN"));
    }

    #[test]
    fn test_read_missing_key_is_not_found() {
        let exec = FakeExecutor::new();
        let key = AptKey::new(&exec, "DEADBEEF");

        assert!(key.read().unwrap_err().is_not_found());
        assert!(!key.exists().unwrap());
    }

    #[test]
    fn test_create_requires_a_source() {
        let exec = FakeExecutor::new();
        let key = AptKey::new(&exec, "DEADBEEF");

        let err = key.create(CreateOpts::default()).unwrap_err();
        assert!(err.to_string().contains("KeyServer or RemoteKeyFile"));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_create_from_keyserver() {
        let exec = FakeExecutor::new();
        let key = AptKey::new(&exec, "1655A0AB");

        key.create(CreateOpts {
            key_server: "keyserver.ubuntu.com".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            exec.calls(),
            vec!["apt-key adv --keyserver keyserver.ubuntu.com --recv-keys 1655A0AB"]
        );
    }

    #[test]
    fn test_create_stderr_is_failure() {
        let exec =
            FakeExecutor::new().respond_stderr("apt-key adv", "gpg: keyserver timed out", 0);
        let key = AptKey::new(&exec, "1655A0AB");

        let err = key
            .create(CreateOpts {
                key_server: "keyserver.ubuntu.com".to_string(),
                ..Default::default()
            })
            .unwrap_err();

        match err {
            Error::Execution { stderr, .. } => assert!(stderr.contains("timed out")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
