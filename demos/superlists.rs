//! Deployment entry point for a Django project.
//!
//! Drop this into `xtask/src/main.rs` and run:
//!
//! ```sh
//! # Deploy the local HEAD commit
//! cargo xtask deploy superlists.example.com --user deploy
//!
//! # Deploy a specific commit with a dedicated key
//! cargo xtask deploy superlists.example.com --user deploy \
//!     --revision 4f1c2e9 --identity ~/.ssh/deploy_ed25519
//!
//! # Which steps would still do work?
//! cargo xtask check superlists.example.com --user deploy
//! ```

use relancar::{Pipeline, Project};

fn main() -> anyhow::Result<()> {
    let project = Project::new("https://github.com/ptrnb/tdd-example.git")
        .package("superlists")
        .python("python3")
        .requirements("requirements.txt")
        .init_template("deploy_tools/gunicorn-template");

    Pipeline::new(project).run()?;
    Ok(())
}
