// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::KeyError;

use camino::Utf8Path;

const OPTIONS: &str = "no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty";

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-'))
}

/// Returns the forced command `sshd` runs for key `id`.
pub(crate) fn command(shell_path: &Utf8Path, id: &str) -> Result<String, KeyError> {
    if !valid_id(id) {
        return Err(KeyError::InvalidId(id.into()));
    }
    Ok(format!("{} {id}", shell_path.join("bin").join("gitlab-shell")))
}

/// Keeps the key type and data, dropping any trailing comment.
pub(crate) fn strip(key: &str) -> String {
    key.split(' ')
        .filter(|s| !s.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders the managed line for `id`, without the terminating newline.
pub(crate) fn render(shell_path: &Utf8Path, id: &str, key: &str) -> Result<String, KeyError> {
    let key = key
        .strip_suffix("\r\n")
        .or_else(|| key.strip_suffix('\n'))
        .unwrap_or(key);
    if key.contains(['\n', '\t']) {
        return Err(KeyError::InvalidKey(key.into()));
    }
    let key = strip(key);
    if key.is_empty() {
        return Err(KeyError::InvalidKey(key));
    }
    let command = command(shell_path, id)?;
    Ok(format!(r#"command="{command}",{OPTIONS} {key}"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> &'static Utf8Path {
        Utf8Path::new("/home/git/gitlab-shell")
    }

    #[test]
    fn render_line() {
        assert_eq!(
            render(shell(), "key-42", "ssh-rsa AAAAB3NzaC1yc2E user@example.com\n").unwrap(),
            r#"command="/home/git/gitlab-shell/bin/gitlab-shell key-42",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty ssh-rsa AAAAB3NzaC1yc2E"#
        );
        assert_eq!(
            render(shell(), "key-1", "ssh-ed25519   AAAAC3Nz").unwrap(),
            r#"command="/home/git/gitlab-shell/bin/gitlab-shell key-1",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty ssh-ed25519 AAAAC3Nz"#
        );
    }

    #[test]
    fn render_rejects() {
        assert_eq!(
            render(shell(), "key-1", "ssh-rsa AAAA\nssh-rsa BBBB"),
            Err(KeyError::InvalidKey("ssh-rsa AAAA\nssh-rsa BBBB".into()))
        );
        assert!(matches!(
            render(shell(), "key-1", "ssh-rsa\tAAAA"),
            Err(KeyError::InvalidKey(_))
        ));
        assert!(matches!(
            render(shell(), "key-1", "   "),
            Err(KeyError::InvalidKey(_))
        ));
        for id in ["", "KEY-1", "key 1", "key-1\"", "key_1", "key-1\n"] {
            assert_eq!(
                render(shell(), id, "ssh-rsa AAAA"),
                Err(KeyError::InvalidId(id.into()))
            );
        }
    }
}
