use std::path::Path;

use sl_core::{fabric_version_id, InstallRoot, FABRIC_LOADER_VERSION, GAME_VERSION, RESOURCE_PACK_FILE};

pub struct Check {
    pub name: String,
    pub result: Result<(), String>,
}

fn check(name: impl Into<String>, result: Result<(), String>) -> Check {
    Check {
        name: name.into(),
        result,
    }
}

fn file_exists(path: &Path) -> Result<(), String> {
    match std::fs::metadata(path) {
        Ok(n) if n.is_file() && n.len() > 0 => Ok(()),
        Ok(_) => Err(format!("{path:?} is empty or not a file")),
        Err(err) => Err(format!("{path:?}: {err}")),
    }
}

fn non_empty_dir(path: &Path) -> Result<(), String> {
    let mut entries = std::fs::read_dir(path).map_err(|err| format!("{path:?}: {err}"))?;
    if entries.next().is_some() {
        Ok(())
    } else {
        Err(format!("{path:?} is empty"))
    }
}

/// What a finished install must contain.
pub fn verify(root: &InstallRoot) -> Vec<Check> {
    let fabric = fabric_version_id(FABRIC_LOADER_VERSION, GAME_VERSION);
    let options = root.options_file();

    vec![
        check(
            format!("{GAME_VERSION}.json"),
            file_exists(&root.version_json(GAME_VERSION)),
        ),
        check(
            format!("{GAME_VERSION}.jar"),
            file_exists(&root.version_jar(GAME_VERSION)),
        ),
        check(format!("{fabric}.json"), file_exists(&root.version_json(&fabric))),
        check(format!("{fabric}.jar"), file_exists(&root.version_jar(&fabric))),
        check("libraries/", non_empty_dir(&root.libraries_dir())),
        check("mods/", non_empty_dir(&root.mods_dir())),
        check(
            "options.txt",
            std::fs::read_to_string(&options)
                .map_err(|err| format!("{options:?}: {err}"))
                .and_then(|text| {
                    let line = format!(r#"resourcePacks:["vanilla","{RESOURCE_PACK_FILE}"]"#);
                    if text.lines().any(|n| n == line) {
                        Ok(())
                    } else {
                        Err(format!("no {line:?} line"))
                    }
                }),
        ),
        check("servers.dat", {
            let path = root.servers_file();
            std::fs::metadata(&path)
                .map(|_| ())
                .map_err(|err| format!("{path:?}: {err}"))
        }),
        check(
            "config/",
            if root.config_dir().is_dir() {
                Ok(())
            } else {
                Err("missing".to_owned())
            },
        ),
    ]
}
