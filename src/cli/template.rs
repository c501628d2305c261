use anyhow::bail;

use crate::catalog::starter_descriptor;
use crate::platform::RepoRef;

pub fn run_template(
    repository: String,
    description: Option<String>,
    web_url: String,
    catalog_url: Option<String>,
) -> anyhow::Result<()> {
    let Some((owner, name)) = repository
        .split_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
    else {
        bail!("Repository must be given as owner/name, got '{repository}'");
    };

    let repo = RepoRef {
        owner: owner.to_string(),
        name: name.to_string(),
        url: format!("{}/{owner}/{name}", web_url.trim_end_matches('/')),
        description,
        archived: false,
    };

    print!("{}", starter_descriptor(&repo, catalog_url.as_deref()));
    Ok(())
}
