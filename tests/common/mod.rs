//! In-memory stand-in for a remote host. Interprets the small set
//! of commands the deployment steps issue against a fake
//! filesystem, git checkout and init-script registry.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use relancar::error::{DeployError, DeployResult};
use relancar::text::{self, Substitution};
use relancar::{CommandOutput, Project, Remote, RemoteCommand, Target};

pub const REPO_URL: &str = "https://git.example.com/superlists.git";
pub const REV_1: &str = "1111111111111111111111111111111111111111";
pub const REV_2: &str = "2222222222222222222222222222222222222222";

pub const SETTINGS_V1: &str = "\
import os
BASE_DIR = os.path.dirname(os.path.dirname(os.path.abspath(__file__)))
SECRET_KEY = 'insecure'
DEBUG = True
TEMPLATE_DEBUG = True
ALLOWED_HOSTS = []
STATIC_URL = '/static/'
STATIC_ROOT = os.path.join(BASE_DIR, '../static')
";

pub const TEMPLATE: &str = "\
#!/bin/sh
# gunicorn for SITENAME
cd /home/deploy/sites/SITENAME/source
exec ../virtualenv/bin/gunicorn superlists.wsgi:application
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFile {
    pub content: String,
    pub executable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    pub running: bool,
    pub on_boot: bool,
}

#[derive(Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, FakeFile>,
    heads: BTreeMap<String, String>,
    services: BTreeMap<String, Service>,
    log: Vec<String>,
    unreachable: bool,
    failures: Vec<String>,
    migrations: usize,
    collections: usize,
    pip_installs: usize,
}

pub struct FakeHost {
    repo: BTreeMap<String, BTreeMap<String, String>>,
    latest: String,
    state: RefCell<State>,
}

pub fn repo_revision(settings: &str, views: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("manage.py".to_string(), "#!/usr/bin/env python3\n".to_string()),
        ("requirements.txt".to_string(), "Django==1.11\ngunicorn\n".to_string()),
        ("superlists/settings.py".to_string(), settings.to_string()),
        ("deploy_tools/gunicorn-template".to_string(), TEMPLATE.to_string()),
        ("lists/views.py".to_string(), views.to_string()),
    ])
}

/// Target and project used across the tests.
pub fn deployment() -> (Target, Project) {
    (
        Target::new("example.com", "deploy").unwrap(),
        Project::new(REPO_URL),
    )
}

impl FakeHost {
    /// A fresh host whose repository has two revisions; `REV_2` is
    /// the default branch tip.
    pub fn new() -> Self {
        let repo = BTreeMap::from([
            (
                REV_1.to_string(),
                repo_revision(SETTINGS_V1, "def home(): return 'v1'\n"),
            ),
            (
                REV_2.to_string(),
                repo_revision(SETTINGS_V1, "def home(): return 'v2'\n"),
            ),
        ]);
        let host = Self {
            repo,
            latest: REV_2.to_string(),
            state: RefCell::new(State::default()),
        };
        for dir in ["/home/deploy", "/etc/init.d", "/usr/share/nginx"] {
            host.mkdir(dir);
        }
        host
    }

    pub fn mkdir(&self, path: &str) {
        let mut state = self.state.borrow_mut();
        mkdir_p(&mut state, path);
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state.borrow().dirs.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state.borrow().files.get(path).map(|f| f.content.clone())
    }

    pub fn is_executable(&self, path: &str) -> bool {
        self.state
            .borrow()
            .files
            .get(path)
            .is_some_and(|f| f.executable)
    }

    pub fn write_file(&self, path: &str, content: &str) {
        let mut state = self.state.borrow_mut();
        put_file(&mut state, path, content);
    }

    pub fn head(&self, checkout: &str) -> Option<String> {
        self.state.borrow().heads.get(checkout).cloned()
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.state.borrow().services.get(name).cloned()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.borrow_mut().unreachable = unreachable;
    }

    /// Make every command whose rendered form contains `needle`
    /// exit with status 1.
    pub fn fail_on(&self, needle: &str) {
        self.state.borrow_mut().failures.push(needle.to_string());
    }

    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    pub fn migrations(&self) -> usize {
        self.state.borrow().migrations
    }

    pub fn collections(&self) -> usize {
        self.state.borrow().collections
    }

    pub fn pip_installs(&self) -> usize {
        self.state.borrow().pip_installs
    }

    fn reachable(&self) -> DeployResult<()> {
        if self.state.borrow().unreachable {
            return Err(DeployError::SshFailed("deploy@example.com: Connection refused".into()));
        }
        Ok(())
    }

    /// Resolve a full hash or a unique prefix of one, as written
    /// `<rev>^{commit}`.
    fn resolve(&self, spec: &str) -> Option<String> {
        let rev = spec.strip_suffix("^{commit}")?;
        let mut matches = self
            .repo
            .keys()
            .filter(|k| rev.len() >= 4 && k.starts_with(rev));
        match (matches.next(), matches.next()) {
            (Some(found), None) => Some(found.clone()),
            _ => None,
        }
    }

    fn checkout(&self, state: &mut State, dest: &str, rev: &str) {
        for (rel, content) in &self.repo[rev] {
            put_file(state, &format!("{dest}/{rel}"), content);
        }
        state.heads.insert(dest.to_string(), rev.to_string());
    }

    fn exec(&self, command: &RemoteCommand, privileged: bool) -> DeployResult<CommandOutput> {
        self.reachable()?;
        let rendered = command.to_string();
        let mut state = self.state.borrow_mut();
        state.log.push(if privileged {
            format!("sudo {rendered}")
        } else {
            rendered.clone()
        });

        if state.failures.iter().any(|f| rendered.contains(f.as_str())) {
            return Ok(output(&rendered, 1, "", "injected failure"));
        }

        let cwd = command.cwd.clone().unwrap_or_else(|| "/home/deploy".to_string());
        let argv = command.argv();
        let result = match argv.as_slice() {
            ["true"] => output(&rendered, 0, "", ""),
            ["mkdir", "-p", path] => {
                if writable(path, privileged) {
                    mkdir_p(&mut state, path);
                    output(&rendered, 0, "", "")
                } else {
                    denied(&rendered)
                }
            }
            ["git", "clone", url, dest] => {
                if *url != REPO_URL {
                    output(&rendered, 128, "", "repository not found")
                } else if state.dirs.contains(&format!("{dest}/.git")) {
                    output(&rendered, 128, "", "destination path already exists")
                } else {
                    mkdir_p(&mut state, &format!("{dest}/.git"));
                    self.checkout(&mut state, dest, &self.latest);
                    output(&rendered, 0, "", "")
                }
            }
            ["git", ..] if !state.dirs.contains(&format!("{cwd}/.git")) => {
                output(&rendered, 128, "", "not a git repository")
            }
            ["git", "fetch"] => output(&rendered, 0, "", ""),
            ["git", "reset", "--hard", rev] => {
                if self.repo.contains_key(*rev) {
                    self.checkout(&mut state, &cwd, rev);
                    output(&rendered, 0, "", "")
                } else {
                    output(&rendered, 128, "", "unknown revision")
                }
            }
            ["git", "rev-parse", "HEAD"] => {
                let head = state.heads.get(&cwd).cloned().unwrap_or_default();
                output(&rendered, 0, &format!("{head}\n"), "")
            }
            ["git", "status", "--porcelain", "--untracked-files=no"] => {
                let head = state.heads.get(&cwd).cloned().unwrap_or_default();
                let mut lines = String::new();
                for (rel, content) in &self.repo[&head] {
                    let current = state.files.get(&format!("{cwd}/{rel}"));
                    if current.is_none_or(|f| f.content != *content) {
                        lines.push_str(&format!(" M {rel}\n"));
                    }
                }
                output(&rendered, 0, &lines, "")
            }
            ["git", "rev-parse", "--verify", spec] => match self.resolve(spec) {
                Some(rev) => output(&rendered, 0, &format!("{rev}\n"), ""),
                None => output(&rendered, 128, "", "fatal: Needed a single revision"),
            },
            ["git", "diff", "-U0", "--", rel] => {
                let head = state.heads.get(&cwd).cloned().unwrap_or_default();
                let committed = self.repo[&head].get(*rel).cloned().unwrap_or_default();
                let current = state
                    .files
                    .get(&format!("{cwd}/{rel}"))
                    .map(|f| f.content.clone())
                    .unwrap_or_default();
                output(&rendered, 0, &line_diff(rel, &committed, &current), "")
            }
            ["grep", "-qxF", "--", line, path] => match state.files.get(*path) {
                None => output(&rendered, 2, "", "No such file or directory"),
                Some(f) if text::contains_line(&f.content, line) => output(&rendered, 0, "", ""),
                Some(_) => output(&rendered, 1, "", ""),
            },
            ["virtualenv", python, venv] if python.starts_with("--python=") => {
                for bin in ["pip", "python3"] {
                    let path = format!("{venv}/bin/{bin}");
                    put_file(&mut state, &path, "");
                    if let Some(f) = state.files.get_mut(&path) {
                        f.executable = true;
                    }
                }
                output(&rendered, 0, "", "")
            }
            [pip, "install", args @ ..] if pip.ends_with("/bin/pip") => {
                if !state.files.contains_key(*pip) {
                    output(&rendered, 127, "", "pip: not found")
                } else if let ["-r", manifest] = args {
                    if state.files.contains_key(*manifest) {
                        state.pip_installs += 1;
                        output(&rendered, 0, "", "")
                    } else {
                        output(&rendered, 1, "", "Could not open requirements file")
                    }
                } else {
                    output(&rendered, 0, "", "")
                }
            }
            [python, "manage.py", sub, "--noinput"] if python.ends_with("/bin/python3") => {
                if !state.files.contains_key(*python)
                    || !state.files.contains_key(&format!("{cwd}/manage.py"))
                {
                    output(&rendered, 2, "", "can't open file 'manage.py'")
                } else if *sub == "collectstatic" {
                    state.collections += 1;
                    output(&rendered, 0, "", "")
                } else if *sub == "migrate" {
                    state.migrations += 1;
                    output(&rendered, 0, "", "")
                } else {
                    output(&rendered, 1, "", "unknown command")
                }
            }
            ["chgrp", _, path] | ["chmod", "g+w", path] => {
                if !privileged {
                    denied(&rendered)
                } else if state.dirs.contains(*path) {
                    output(&rendered, 0, "", "")
                } else {
                    output(&rendered, 1, "", "No such file or directory")
                }
            }
            ["chmod", "+x", path] => match state.files.get_mut(*path) {
                Some(f) if privileged || path.starts_with("/home/") => {
                    f.executable = true;
                    output(&rendered, 0, "", "")
                }
                Some(_) => denied(&rendered),
                None => output(&rendered, 1, "", "No such file or directory"),
            },
            ["cp", src, dst] => match state.files.get(*src).cloned() {
                Some(f) if writable(dst, privileged) => {
                    put_file(&mut state, dst, &f.content);
                    output(&rendered, 0, "", "")
                }
                Some(_) => denied(&rendered),
                None => output(&rendered, 1, "", "No such file or directory"),
            },
            ["rm", path] => {
                if !writable(path, privileged) {
                    denied(&rendered)
                } else if state.files.remove(*path).is_some() {
                    output(&rendered, 0, "", "")
                } else {
                    output(&rendered, 1, "", "No such file or directory")
                }
            }
            [script, "start"] if script.starts_with("/etc/init.d/") => {
                let name = script.trim_start_matches("/etc/init.d/").to_string();
                let startable = state
                    .files
                    .get(*script)
                    .map(|f| f.executable && !f.content.contains("SITENAME"));
                match startable {
                    Some(true) if privileged => {
                        state.services.entry(name).or_default().running = true;
                        output(&rendered, 0, "Starting gunicorn\n", "")
                    }
                    Some(_) => output(&rendered, 1, "", "start failed"),
                    None => output(&rendered, 127, "", "not found"),
                }
            }
            ["chkconfig", name, "--add"] if privileged => {
                match state.services.get_mut(*name) {
                    Some(s) if s.running => {
                        s.on_boot = true;
                        output(&rendered, 0, "", "")
                    }
                    _ => output(&rendered, 1, "", "service not running"),
                }
            }
            _ => output(&rendered, 127, "", "command not found"),
        };
        Ok(result)
    }
}

impl Remote for FakeHost {
    fn run(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        self.exec(command, false)
    }

    fn sudo(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        self.exec(command, true)
    }

    fn exists(&self, path: &str) -> DeployResult<bool> {
        self.reachable()?;
        let state = self.state.borrow();
        Ok(state.dirs.contains(path) || state.files.contains_key(path))
    }

    fn substitute(
        &self,
        path: &str,
        edit: &Substitution,
        privileged: bool,
    ) -> DeployResult<bool> {
        self.reachable()?;
        let mut state = self.state.borrow_mut();
        state.log.push(format!("substitute {path}"));
        if !writable(path, privileged) {
            return Err(DeployError::CommandFailed {
                command: format!("tee -- {path}"),
                code: Some(1),
                stderr: "Permission denied".into(),
            });
        }
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| DeployError::FileNotFound(path.to_string()))?;
        match text::substitute(&file.content, edit) {
            Some(updated) => {
                file.content = updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_line(&self, path: &str, line: &str) -> DeployResult<bool> {
        self.reachable()?;
        let mut state = self.state.borrow_mut();
        state.log.push(format!("append {path}"));
        let content = state
            .files
            .get(path)
            .map(|f| f.content.clone())
            .unwrap_or_default();
        match text::append_line(&content, line) {
            Some(updated) => {
                put_file(&mut state, path, &updated);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn output(command: &str, code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        command: command.to_string(),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        code: Some(code),
    }
}

/// Zero-context diff comparing lines by position, enough for the
/// in-place edits the tests make.
fn line_diff(rel: &str, committed: &str, current: &str) -> String {
    if committed == current {
        return String::new();
    }
    let old: Vec<&str> = committed.lines().collect();
    let new: Vec<&str> = current.lines().collect();
    let mut out = format!("diff --git a/{rel} b/{rel}\n--- a/{rel}\n+++ b/{rel}\n");
    for i in 0..old.len().max(new.len()) {
        match (old.get(i), new.get(i)) {
            (Some(a), Some(b)) if a == b => {}
            (a, b) => {
                out.push_str(&format!("@@ -{} +{} @@\n", i + 1, i + 1));
                if let Some(a) = a {
                    out.push_str(&format!("-{a}\n"));
                }
                if let Some(b) = b {
                    out.push_str(&format!("+{b}\n"));
                }
            }
        }
    }
    out
}

fn denied(command: &str) -> CommandOutput {
    output(command, 1, "", "Permission denied")
}

fn writable(path: &str, privileged: bool) -> bool {
    privileged || path.starts_with("/home/")
}

fn mkdir_p(state: &mut State, path: &str) {
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        state.dirs.insert(current.clone());
    }
}

fn put_file(state: &mut State, path: &str, content: &str) {
    if let Some((parent, _)) = path.rsplit_once('/') {
        mkdir_p(state, parent);
    }
    let executable = state.files.get(path).is_some_and(|f| f.executable);
    state.files.insert(
        path.to_string(),
        FakeFile {
            content: content.to_string(),
            executable,
        },
    );
}
