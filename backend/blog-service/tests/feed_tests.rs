//! Feed composition and social graph behaviour over the in-memory store

mod common;

use blog_service::error::AppError;
use blog_service::services::{FollowOutcome, PageRequest};
use common::TestContext;

#[actix_rt::test]
async fn feeds_list_newest_first() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    for i in 0..5 {
        ctx.post(&alice, &format!("post {}", i), None).await;
    }

    let page = ctx.state.feeds.global(PageRequest::first()).await.unwrap();
    let texts: Vec<&str> = page.items.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["post 4", "post 3", "post 2", "post 1", "post 0"]);
    for pair in page.items.windows(2) {
        assert!(pair[0].pub_date > pair[1].pub_date);
    }
}

#[actix_rt::test]
async fn thirteen_posts_paginate_ten_then_three() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    for i in 0..13 {
        ctx.post(&alice, &format!("post {}", i), None).await;
    }

    let first = ctx.state.feeds.global(PageRequest::number(1)).await.unwrap();
    let second = ctx.state.feeds.global(PageRequest::number(2)).await.unwrap();
    let third = ctx.state.feeds.global(PageRequest::number(3)).await.unwrap();
    let garbage = ctx
        .state
        .feeds
        .global(PageRequest::parse(Some("abc")))
        .await
        .unwrap();

    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 3);
    assert_eq!(first.count, 13);
    assert_eq!(first.num_pages, 2);
    assert_eq!(third, second);
    assert_eq!(garbage, first);

    let profile = ctx
        .state
        .feeds
        .profile("alice", None, PageRequest::number(2))
        .await
        .unwrap();
    assert_eq!(profile.page.len(), 3);
    assert_eq!(profile.posts_count, 13);
}

#[actix_rt::test]
async fn post_appears_once_in_each_matching_feed() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let group = ctx.group("test-slug").await;
    let other = ctx.group("other-slug").await;
    let post = ctx.post(&alice, "hello", Some(&group)).await;

    let global = ctx.state.feeds.global(PageRequest::first()).await.unwrap();
    let in_group = ctx
        .state
        .feeds
        .group("test-slug", PageRequest::first())
        .await
        .unwrap();
    let profile = ctx
        .state
        .feeds
        .profile("alice", None, PageRequest::first())
        .await
        .unwrap();
    let in_other = ctx
        .state
        .feeds
        .group(&other.slug, PageRequest::first())
        .await
        .unwrap();

    for items in [&global.items, &in_group.page.items, &profile.page.items] {
        assert_eq!(items.iter().filter(|p| p.id == post.id).count(), 1);
    }
    assert!(in_other.page.is_empty());
    assert_eq!(in_group.group.id, group.id);
}

#[actix_rt::test]
async fn unknown_group_or_user_is_not_found() {
    let ctx = TestContext::new();

    assert!(matches!(
        ctx.state.feeds.group("missing", PageRequest::first()).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ctx.state.feeds.profile("nobody", None, PageRequest::first()).await,
        Err(AppError::NotFound(_))
    ));
}

#[actix_rt::test]
async fn follow_feed_shows_only_followed_authors() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    let carol = ctx.user("carol").await;

    let (_, outcome) = ctx.state.follows.follow(bob.id, "alice").await.unwrap();
    assert_eq!(outcome, FollowOutcome::Created);
    let post = ctx.post(&alice, "new from alice", None).await;
    ctx.post(&carol, "carol talks to herself", None).await;

    let bobs = ctx
        .state
        .feeds
        .follow(Some(bob.id), PageRequest::first())
        .await
        .unwrap();
    let carols = ctx
        .state
        .feeds
        .follow(Some(carol.id), PageRequest::first())
        .await
        .unwrap();

    assert_eq!(bobs.items.len(), 1);
    assert_eq!(bobs.items[0].id, post.id);
    assert!(carols.is_empty());
    assert!(matches!(
        ctx.state.feeds.follow(None, PageRequest::first()).await,
        Err(AppError::Unauthenticated)
    ));
}

#[actix_rt::test]
async fn profile_reports_follow_state_and_counts() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    let carol = ctx.user("carol").await;
    ctx.state.follows.follow(bob.id, "alice").await.unwrap();
    ctx.state.follows.follow(carol.id, "alice").await.unwrap();
    ctx.state.follows.follow(alice.id, "carol").await.unwrap();

    let seen_by_bob = ctx
        .state
        .feeds
        .profile("alice", Some(bob.id), PageRequest::first())
        .await
        .unwrap();
    assert!(seen_by_bob.following);
    assert_eq!(seen_by_bob.followers_count, 2);
    assert_eq!(seen_by_bob.following_count, 1);

    let anonymous = ctx
        .state
        .feeds
        .profile("alice", None, PageRequest::first())
        .await
        .unwrap();
    assert!(!anonymous.following);
}

#[actix_rt::test]
async fn follow_twice_then_unfollow_twice() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;

    ctx.state.follows.follow(bob.id, "alice").await.unwrap();
    ctx.state.follows.follow(bob.id, "alice").await.unwrap();
    assert_eq!(ctx.state.follows.follower_count(alice.id).await.unwrap(), 1);

    ctx.state.follows.unfollow(bob.id, "alice").await.unwrap();
    ctx.state.follows.unfollow(bob.id, "alice").await.unwrap();
    assert_eq!(ctx.state.follows.follower_count(alice.id).await.unwrap(), 0);
}

#[actix_rt::test]
async fn self_follow_leaves_no_edge() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;

    let (_, outcome) = ctx.state.follows.follow(alice.id, "alice").await.unwrap();
    assert_eq!(outcome, FollowOutcome::SelfFollow);
    assert!(!ctx
        .state
        .follows
        .is_following(Some(alice.id), alice.id)
        .await
        .unwrap());
    assert_eq!(ctx.state.follows.following_count(alice.id).await.unwrap(), 0);
}

#[actix_rt::test]
async fn deleting_a_group_detaches_its_posts() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let group = ctx.group("test-slug").await;
    let post = ctx.post(&alice, "hello", Some(&group)).await;

    ctx.state.groups.delete(group.id).await.unwrap();

    let kept = ctx.state.posts.get(post.id).await.unwrap();
    assert_eq!(kept.group_id, None);

    let global = ctx.state.feeds.global(PageRequest::first()).await.unwrap();
    let profile = ctx
        .state
        .feeds
        .profile("alice", None, PageRequest::first())
        .await
        .unwrap();
    assert!(global.items.iter().any(|p| p.id == post.id));
    assert!(profile.page.items.iter().any(|p| p.id == post.id));
    assert!(matches!(
        ctx.state.feeds.group("test-slug", PageRequest::first()).await,
        Err(AppError::NotFound(_))
    ));
}

#[actix_rt::test]
async fn deleting_a_user_removes_their_posts_from_every_feed() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    ctx.post(&alice, "by alice", None).await;
    ctx.post(&bob, "by bob", None).await;
    ctx.state.follows.follow(bob.id, "alice").await.unwrap();

    ctx.state.users.delete(alice.id).await.unwrap();

    let global = ctx.state.feeds.global(PageRequest::first()).await.unwrap();
    assert_eq!(global.items.len(), 1);
    assert_eq!(global.items[0].author, "bob");
    let bobs = ctx
        .state
        .feeds
        .follow(Some(bob.id), PageRequest::first())
        .await
        .unwrap();
    assert!(bobs.is_empty());
    assert_eq!(ctx.state.follows.following_count(bob.id).await.unwrap(), 0);
}

#[actix_rt::test]
async fn search_unions_name_fields_and_post_text() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    ctx.user("malice").await;
    ctx.post(&alice, "Alice in wonderland", None).await;
    ctx.post(&alice, "nothing to see", None).await;

    let results = ctx.state.search.search("ALIC").await.unwrap();
    let names: Vec<&str> = results.users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "malice"]);
    assert_eq!(results.posts.len(), 1);

    let blank = ctx.state.search.search("").await.unwrap();
    assert!(blank.users.is_empty() && blank.posts.is_empty());
}
