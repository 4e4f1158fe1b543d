// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::checks::{PushFileCountCheck, SnippetCheck, Validator};
use super::{Access, Context, Denied};

use gitgate_type::{Abilities, Ability, Actor, Container};

use axum::async_trait;

const SNIPPET_NOT_FOUND: &str = "The snippet you were looking for could not be found.";

/// Access rules of personal and project snippet repositories.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnippetAccess;

#[async_trait]
impl Access for SnippetAccess {
    fn download_ability(&self) -> Ability {
        Ability::ReadSnippet
    }

    fn push_ability(&self) -> Ability {
        Ability::UpdateSnippet
    }

    fn accepts(&self, actor: &Actor) -> Result<(), Denied> {
        match actor {
            Actor::User(_) | Actor::SshKey(_) => Ok(()),
            _ => Err(Denied::forbidden(
                "The authentication mechanism is not supported.",
            )),
        }
    }

    fn authentication_abilities(&self, abilities: &Abilities) -> Abilities {
        abilities.restrict(&[Ability::DownloadCode, Ability::PushCode])
    }

    fn resolve_container<'c>(&self, cx: &Context<'c>) -> Result<&'c Container, Denied> {
        cx.located
            .map(|located| &located.container)
            .filter(|container| container.is_snippet())
            .ok_or_else(|| Denied::not_found(SNIPPET_NOT_FOUND))
    }

    /// A project snippet is only reachable through its own project.
    fn validate_namespace(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied> {
        let owner = container.project().map(|p| p.full_path.as_str());
        if cx.path.project.as_deref() == owner {
            Ok(())
        } else {
            Err(Denied::not_found(SNIPPET_NOT_FOUND))
        }
    }

    async fn validate_container_state(
        &self,
        cx: &Context<'_>,
        container: &Container,
    ) -> Result<(), Denied> {
        let Some(project) = container.project() else {
            return Ok(());
        };
        let project = Container::Project(project.clone());
        if cx.can(cx.actor(), Ability::ReadProject, &project).await?
            || cx.guest_can(Ability::ReadProject, &project).await?
        {
            Ok(())
        } else {
            Err(Denied::not_found(SNIPPET_NOT_FOUND))
        }
    }

    fn no_repo_message(&self) -> &'static str {
        "The snippet repository you were looking for could not be found."
    }

    fn custom_action_enabled(&self) -> bool {
        false
    }

    async fn check_download(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied> {
        let ability = self.download_ability();
        if cx.guest_can(ability, container).await? || cx.can(cx.actor(), ability, container).await?
        {
            Ok(())
        } else {
            Err(Denied::forbidden("You are not allowed to read this snippet."))
        }
    }

    async fn check_push(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied> {
        let actor = cx.actor();
        if actor.user().is_some() && cx.can(actor, self.push_ability(), container).await? {
            Ok(())
        } else {
            Err(Denied::forbidden("You are not allowed to update this snippet."))
        }
    }

    fn validators<'c>(
        &self,
        cx: &Context<'c>,
        container: &'c Container,
    ) -> Vec<Box<dyn Validator + 'c>> {
        vec![
            Box::new(SnippetCheck::new(container.default_branch())),
            Box::new(
                PushFileCountCheck::new(container, cx.inspector, cx.config.git.snippet_file_limit)
                    .require_files(),
            ),
        ]
    }
}
