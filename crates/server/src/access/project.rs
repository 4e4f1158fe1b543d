// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::checks::{PushFileCountCheck, RefCheck, Validator};
use super::{Access, Context, Denied, PROJECT_NOT_FOUND};

use gitgate_type::{Ability, Actor, Container};

use axum::async_trait;

/// Access rules of project and wiki repositories.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectAccess;

#[async_trait]
impl Access for ProjectAccess {
    fn download_ability(&self) -> Ability {
        Ability::DownloadCode
    }

    fn push_ability(&self) -> Ability {
        Ability::PushCode
    }

    fn accepts(&self, _: &Actor) -> Result<(), Denied> {
        Ok(())
    }

    fn resolve_container<'c>(&self, cx: &Context<'c>) -> Result<&'c Container, Denied> {
        cx.located
            .map(|located| &located.container)
            .filter(|container| !container.is_snippet())
            .ok_or_else(|| Denied::not_found(PROJECT_NOT_FOUND))
    }

    /// The project returned by the lookup must live inside a namespace.
    fn validate_namespace(&self, _: &Context<'_>, container: &Container) -> Result<(), Denied> {
        match container
            .project()
            .and_then(|project| project.full_path.rsplit_once('/'))
        {
            Some((namespace, _)) if !namespace.is_empty() => Ok(()),
            _ => Err(Denied::not_found(
                "The namespace you were looking for could not be found.",
            )),
        }
    }

    async fn validate_container_state(
        &self,
        cx: &Context<'_>,
        container: &Container,
    ) -> Result<(), Denied> {
        if cx.can(cx.actor(), Ability::ReadProject, container).await?
            || cx.guest_can(Ability::ReadProject, container).await?
        {
            Ok(())
        } else {
            Err(Denied::not_found(PROJECT_NOT_FOUND))
        }
    }

    fn no_repo_message(&self) -> &'static str {
        "A repository for this project does not exist yet."
    }

    fn custom_action_enabled(&self) -> bool {
        true
    }

    async fn check_download(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied> {
        let ability = self.download_ability();
        if cx.guest_can(ability, container).await? {
            return Ok(());
        }
        let granted = cx.auth.abilities();
        let actor = cx.actor();
        if granted.contains(ability) && cx.can(actor, ability, container).await? {
            return Ok(());
        }
        if granted.contains(Ability::BuildDownloadCode)
            && cx.can(actor, Ability::BuildDownloadCode, container).await?
        {
            return Ok(());
        }
        Err(Denied::forbidden(
            "You are not allowed to download code from this project.",
        ))
    }

    async fn check_push(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied> {
        let actor = cx.actor();
        if cx.can(actor, self.push_ability(), container).await? {
            return Ok(());
        }
        Err(Denied::forbidden(match actor {
            Actor::DeployKey(_) => "This deploy key does not have write access to this project.",
            Actor::DeployToken(_) => {
                "This deploy token does not have write access to this project."
            }
            _ if actor.user().is_some() => "You are not allowed to push code to this project.",
            _ => "You are not allowed to upload code for this project.",
        }))
    }

    fn validators<'c>(
        &self,
        cx: &Context<'c>,
        container: &'c Container,
    ) -> Vec<Box<dyn Validator + 'c>> {
        let mut validators: Vec<Box<dyn Validator + 'c>> =
            vec![Box::new(RefCheck::new(container.default_branch()))];
        if let Some(limit) = cx.config.git.project_file_limit {
            validators.push(Box::new(PushFileCountCheck::new(
                container,
                cx.inspector,
                limit,
            )));
        }
        validators
    }
}
