//! YAML fixtures for repository tests.

use std::fmt::Write as _;

/// A repository manifest listing `commands` as `(name, file)` pairs.
#[must_use]
pub fn manifest_yaml(repo_name: &str, commands: &[(&str, &str)]) -> String {
    let mut yaml = format!(
        "name: {repo_name}\nversion: 1.0.0\ndescription: Test repository {repo_name}\ncommands:\n"
    );
    for (name, file) in commands {
        let _ = write!(
            yaml,
            "  - name: {name}\n    description: The {name} command\n    \
             category: code\n    file: {file}\n"
        );
    }
    yaml
}

/// A minimal command spec with one optional positional argument.
#[must_use]
pub fn command_spec_yaml(name: &str, version: &str) -> String {
    format!(
        "name: {name}\n\
         version: {version}\n\
         description: The {name} command\n\
         usage: {name} [file]\n\
         category: code\n\
         args:\n\
         \x20 - name: file\n\
         \x20   description: File to inspect\n\
         \x20   required: false\n\
         \x20   default: main.rs\n\
         prompt:\n\
         \x20 system: You are terse.\n\
         \x20 template: \"{name} {{{{ .file }}}}: {{{{ .stdin }}}}\"\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_yaml_lists_commands() {
        let yaml = manifest_yaml("alpha", &[("explain", "commands/explain.yaml")]);
        assert!(yaml.contains("name: alpha"));
        assert!(yaml.contains("  - name: explain\n"));
        assert!(yaml.contains("    file: commands/explain.yaml\n"));
    }

    #[test]
    fn test_command_spec_yaml_template() {
        let yaml = command_spec_yaml("review", "1.2.0");
        assert!(yaml.contains("version: 1.2.0\n"));
        assert!(yaml.contains("template: \"review {{ .file }}: {{ .stdin }}\""));
        assert!(yaml.contains("  - name: file\n"));
    }
}
