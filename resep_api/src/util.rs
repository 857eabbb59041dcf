// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

/// Write `content` into a new file at `path`, refusing to overwrite.
pub fn create_template(path: &str, content: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!path.is_empty(), "empty template path");
    match std::path::Path::new(&path).exists() {
        true => anyhow::bail!("cannot overwrite configuration file: {}", path),
        false => {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, content)?;
            log::info!("created template {}", path);
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_create_template_no_overwrite() {
        let dir = std::env::temp_dir().join(format!("resep-template-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("conf.toml");
        let path = path.to_str().unwrap();

        create_template(path, "a = 1\n").unwrap();
        assert_eq!("a = 1\n", std::fs::read_to_string(path).unwrap());
        assert!(create_template(path, "a = 2\n").is_err());
        assert_eq!("a = 1\n", std::fs::read_to_string(path).unwrap());
        assert!(create_template("", "").is_err());

        let _ = std::fs::remove_dir_all(dir);
    }
}
