//! Plain (non-connection) field selections per role
//!
//! Interpolated into module queries so every module fetches the same
//! scalar shape for a given role.

use crate::graph::TypeRole;

pub fn plain_fields(role: TypeRole) -> &'static str {
    match role {
        TypeRole::User => {
            "id login name email avatarUrl bio company location websiteUrl \
             twitterUsername url createdAt updatedAt"
        }
        TypeRole::Discussion => {
            "id number title body bodyHTML bodyText url upvoteCount locked \
             createdAt updatedAt publishedAt lastEditedAt"
        }
        TypeRole::Label => "id name color description isDefault url createdAt updatedAt",
        TypeRole::Repository => {
            "id name nameWithOwner description homepageUrl url sshUrl isFork \
             isPrivate isArchived isTemplate stargazerCount forkCount createdAt \
             updatedAt pushedAt openGraphImageUrl visibility"
        }
        TypeRole::Topic => "id name stargazerCount viewerHasStarred",
        TypeRole::RepositoryTopic => "id resourcePath url",
        TypeRole::DiscussionCategory => {
            "id name slug emoji emojiHTML description isAnswerable createdAt updatedAt"
        }
        TypeRole::Issue => "id number title body bodyHTML url state createdAt updatedAt closedAt",
    }
}
