use crate::domain::post::{BlogIdPostId, Post};
use crate::domain::store::{PostStore, TagStore};
use crate::domain::tag::Tag;
use crate::domain::update::{UpdateAction, UpdateResult};
use anyhow::Result;

/// 1回の照合の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// 呼び出し元へ伝播する最終結果
    pub result: UpdateResult,
    /// この照合で新しくギャップを検出したか
    pub gap_detected: bool,
}

impl ReconcileOutcome {
    fn new(result: UpdateResult, gap_detected: bool) -> Self {
        Self {
            result,
            gap_detected,
        }
    }
}

/// 取得したバッチをキャッシュと照合し、必要な削除・マージ・マーカー操作を行う
///
/// バッチはサーバーが返した公開日時の降順であることを前提とする。
/// ギャップ検出はタグソースのみに適用され、ブログ・フィードでは
/// 破壊的な前処理もマーカー操作も行われない。
///
/// バッチがない（転送失敗）場合はFailedを返し、一切の変更を行わない。
pub async fn reconcile<P: PostStore, T: TagStore>(
    posts: &P,
    tags: &T,
    tag: Option<&Tag>,
    action: UpdateAction,
    batch: Option<Vec<Post>>,
) -> Result<ReconcileOutcome> {
    let Some(mut batch) = batch else {
        return Ok(ReconcileOutcome::new(UpdateResult::Failed, false));
    };

    let result = posts.compare(&batch).await?;
    let mut gap_post: Option<BlogIdPostId> = None;

    if result.is_new_or_changed() {
        if let Some(tag) = tag {
            match action {
                UpdateAction::RequestNewer => {
                    // サーバーとキャッシュに共通の投稿が1件もなければ（ローカルに
                    // 投稿がある前提で）両者の間にギャップがあるとみなす
                    let batch_len = batch.len();
                    if batch_len >= 2
                        && posts.count_for_tag(tag).await? > 0
                        && !posts.has_overlap(&batch, tag).await?
                    {
                        // 末尾から2番目の投稿をギャップ境界として扱う
                        gap_post = Some(batch[batch_len - 2].ids());
                        // 実際にはギャップがなかった場合に備え、最後の投稿は
                        // マージ対象から外す
                        batch.pop();

                        if tags.gap_marker(tag).await?.is_some() {
                            // マーカーは同時に2つ存在してはならない。既存マーカー
                            // より古い投稿を削除してからマーカーをクリアする
                            posts.delete_older_than_marker(tag).await?;
                            tags.clear_gap_marker(tag).await?;
                        }
                    }
                }
                UpdateAction::RequestOlderThanGap => {
                    // ギャップを埋める要求の場合、マーカーより古い既存投稿を
                    // 削除してからマーカーを外す
                    posts.delete_older_than_marker(tag).await?;
                    tags.clear_gap_marker(tag).await?;
                }
                UpdateAction::RequestRefresh => {
                    posts.delete_all_for_tag(tag).await?;
                }
                UpdateAction::RequestOlder => {}
            }
        }

        posts.upsert(tag, &batch).await?;

        // ギャップマーカーは保存済みの投稿だけを指せるため、マージ後に設定する
        if let (Some(tag), Some(ids)) = (tag, gap_post) {
            tags.set_gap_marker(ids, tag).await?;
            println!("ギャップマーカーを設定: タグ {}", tag.slug);
        }
    } else if result == UpdateResult::Unchanged && action == UpdateAction::RequestOlderThanGap {
        if let Some(tag) = tag {
            // ギャップを埋める取得が何も返さなかった場合、マーカーを残し続けても
            // 解決しないため破棄する
            tags.clear_gap_marker(tag).await?;
            eprintln!("ギャップを埋める取得で新規投稿なし: タグ {}", tag.slug);
        }
    }

    Ok(ReconcileOutcome::new(result, gap_post.is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::parser::parse_date;
    use crate::infra::storage::memory::MemoryStore;

    fn make_post(blog_id: i64, post_id: i64, date: &str) -> Post {
        Post {
            blog_id,
            post_id,
            feed_id: None,
            title: format!("投稿{}", post_id),
            url: format!("https://blog{}.example.com/{}", blog_id, post_id),
            pub_date: parse_date(date).unwrap(),
            num_likes: 0,
        }
    }

    // バッチなし（転送失敗）のテスト
    #[tokio::test]
    async fn test_absent_batch_fails_without_mutation() {
        let store = MemoryStore::new();
        let tag = Tag::custom("rust");
        store.seed_post(Some(&tag), make_post(1, 1, "2025-08-01T12:00:00Z"));

        let outcome = reconcile(&store, &store, Some(&tag), UpdateAction::RequestNewer, None)
            .await
            .unwrap();

        assert_eq!(outcome.result, UpdateResult::Failed);
        assert!(!outcome.gap_detected);
        assert_eq!(store.total_posts(), 1, "失敗時はキャッシュが変化しないはず");
    }

    // ギャップ検出のテスト
    mod gap_detection_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_overlap_plants_gap_marker() {
            // キャッシュ1件 + 重複なしの新規3件 -> 2件マージ、境界にマーカー
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            store.seed_post(Some(&tag), make_post(1, 1, "2025-08-01T12:00:00Z"));

            let batch = vec![
                make_post(1, 30, "2025-08-10T12:00:00Z"),
                make_post(1, 29, "2025-08-09T12:00:00Z"),
                make_post(1, 28, "2025-08-08T12:00:00Z"),
            ];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(batch),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::HasNew);
            assert!(outcome.gap_detected, "ギャップが検出されるはず");

            let cached = store.posts_for_tag("rust");
            assert_eq!(cached.len(), 3, "既存1件 + マージ2件（最後の1件は除外）");
            assert!(
                cached.iter().all(|p| p.post_id != 28),
                "バッチ末尾の投稿はマージされないはず"
            );
            // マーカーはバッチのインデックス1（末尾から2番目）を指す
            assert_eq!(
                store.gap_marker_of("rust"),
                Some(BlogIdPostId::new(1, 29))
            );
        }

        #[tokio::test]
        async fn test_overlap_prevents_gap() {
            // キャッシュと重複があればバッチサイズに関係なくギャップなし
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            let shared = make_post(1, 28, "2025-08-08T12:00:00Z");
            store.seed_post(Some(&tag), shared.clone());

            let batch = vec![
                make_post(1, 30, "2025-08-10T12:00:00Z"),
                make_post(1, 29, "2025-08-09T12:00:00Z"),
                shared,
            ];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(batch),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::HasNew);
            assert!(!outcome.gap_detected);
            assert_eq!(store.gap_marker_of("rust"), None);
            assert_eq!(store.posts_for_tag("rust").len(), 3, "全件マージされるはず");
        }

        #[tokio::test]
        async fn test_empty_cache_prevents_gap() {
            // ローカルに投稿がなければギャップは定義されない
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");

            let batch = vec![
                make_post(1, 30, "2025-08-10T12:00:00Z"),
                make_post(1, 29, "2025-08-09T12:00:00Z"),
            ];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(batch),
            )
            .await
            .unwrap();

            assert!(!outcome.gap_detected);
            assert_eq!(store.gap_marker_of("rust"), None);
            assert_eq!(store.posts_for_tag("rust").len(), 2);
        }

        #[tokio::test]
        async fn test_single_item_batch_prevents_gap() {
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            store.seed_post(Some(&tag), make_post(1, 1, "2025-08-01T12:00:00Z"));

            let batch = vec![make_post(1, 30, "2025-08-10T12:00:00Z")];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(batch),
            )
            .await
            .unwrap();

            assert!(!outcome.gap_detected);
            assert_eq!(store.posts_for_tag("rust").len(), 2);
        }

        #[tokio::test]
        async fn test_two_item_batch_boundary_is_first() {
            // 境界は常に末尾から2番目: 2件バッチでは先頭がマーカーになり、
            // マージされるのは1件だけになる
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            store.seed_post(Some(&tag), make_post(1, 1, "2025-08-01T12:00:00Z"));

            let batch = vec![
                make_post(1, 30, "2025-08-10T12:00:00Z"),
                make_post(1, 29, "2025-08-09T12:00:00Z"),
            ];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(batch),
            )
            .await
            .unwrap();

            assert!(outcome.gap_detected);
            assert_eq!(
                store.gap_marker_of("rust"),
                Some(BlogIdPostId::new(1, 30))
            );
            let cached = store.posts_for_tag("rust");
            assert_eq!(cached.len(), 2, "既存1件 + マージ1件");
        }

        #[tokio::test]
        async fn test_existing_marker_replaced_not_duplicated() {
            // 既存マーカーがある状態で新たなギャップを検出した場合、
            // 旧マーカーより古い投稿を削除してから新マーカーを立てる
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            let old_marker_post = make_post(1, 10, "2025-08-05T12:00:00Z");
            store.seed_post(Some(&tag), old_marker_post.clone());
            store.seed_post(Some(&tag), make_post(1, 9, "2025-08-04T12:00:00Z"));
            store
                .set_gap_marker(old_marker_post.ids(), &tag)
                .await
                .unwrap();

            let batch = vec![
                make_post(1, 30, "2025-08-10T12:00:00Z"),
                make_post(1, 29, "2025-08-09T12:00:00Z"),
                make_post(1, 28, "2025-08-08T12:00:00Z"),
            ];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(batch),
            )
            .await
            .unwrap();

            assert!(outcome.gap_detected);
            // マーカーは常に最大1つ
            assert_eq!(
                store.gap_marker_of("rust"),
                Some(BlogIdPostId::new(1, 29))
            );
            let cached = store.posts_for_tag("rust");
            assert!(
                cached.iter().all(|p| p.post_id != 9),
                "旧マーカーより古い投稿は削除されるはず"
            );
            assert!(
                cached.iter().any(|p| p.post_id == 10),
                "旧マーカーが指していた投稿自体は残るはず"
            );
        }

        #[tokio::test]
        async fn test_gap_never_fires_for_blog_or_feed() {
            // タグなし（ブログ・フィード）ではギャップ検出は走らない
            let store = MemoryStore::new();
            store.seed_post(None, make_post(7, 1, "2025-08-01T12:00:00Z"));

            let batch = vec![
                make_post(7, 30, "2025-08-10T12:00:00Z"),
                make_post(7, 29, "2025-08-09T12:00:00Z"),
                make_post(7, 28, "2025-08-08T12:00:00Z"),
            ];
            let outcome = reconcile(&store, &store, None, UpdateAction::RequestNewer, Some(batch))
                .await
                .unwrap();

            assert_eq!(outcome.result, UpdateResult::HasNew);
            assert!(!outcome.gap_detected);
            assert_eq!(store.total_posts(), 4, "3件すべてマージされるはず");
        }
    }

    // アクションごとの前処理のテスト
    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_refresh_replaces_cache_entirely() {
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            store.seed_post(Some(&tag), make_post(1, 1, "2025-08-01T12:00:00Z"));
            store.seed_post(Some(&tag), make_post(1, 2, "2025-08-02T12:00:00Z"));

            let batch = vec![make_post(1, 30, "2025-08-10T12:00:00Z")];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestRefresh,
                Some(batch.clone()),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::HasNew);
            let cached = store.posts_for_tag("rust");
            assert_eq!(cached.len(), 1, "キャッシュは取得バッチだけになるはず");
            assert_eq!(cached[0].post_id, 30);
        }

        #[tokio::test]
        async fn test_older_merges_without_destruction() {
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            store.seed_post(Some(&tag), make_post(1, 10, "2025-08-10T12:00:00Z"));

            let batch = vec![make_post(1, 9, "2025-08-09T12:00:00Z")];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestOlder,
                Some(batch),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::HasNew);
            assert_eq!(store.posts_for_tag("rust").len(), 2, "破壊的な前処理なし");
        }

        #[tokio::test]
        async fn test_fill_gap_with_changed_batch_clears_marker_and_tail() {
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            let marker_post = make_post(1, 10, "2025-08-05T12:00:00Z");
            store.seed_post(Some(&tag), make_post(1, 11, "2025-08-06T12:00:00Z"));
            store.seed_post(Some(&tag), marker_post.clone());
            store.seed_post(Some(&tag), make_post(1, 3, "2025-08-01T12:00:00Z"));
            store
                .set_gap_marker(marker_post.ids(), &tag)
                .await
                .unwrap();

            let batch = vec![
                make_post(1, 9, "2025-08-04T12:00:00Z"),
                make_post(1, 8, "2025-08-03T12:00:00Z"),
            ];
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestOlderThanGap,
                Some(batch),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::HasNew);
            assert!(!outcome.gap_detected);
            assert_eq!(store.gap_marker_of("rust"), None, "マーカーはクリアされるはず");
            let cached = store.posts_for_tag("rust");
            assert!(
                cached.iter().all(|p| p.post_id != 3),
                "マーカーより古い既存投稿は残らないはず"
            );
            assert_eq!(cached.len(), 4, "既存2件 + 取得2件");
        }

        #[tokio::test]
        async fn test_unfillable_gap_is_abandoned() {
            // ギャップを埋める取得がUnchangedでもマーカーはクリアする
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            let marker_post = make_post(1, 10, "2025-08-05T12:00:00Z");
            store.seed_post(Some(&tag), marker_post.clone());
            store
                .set_gap_marker(marker_post.ids(), &tag)
                .await
                .unwrap();

            // キャッシュと完全一致のバッチ -> Unchanged
            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestOlderThanGap,
                Some(vec![marker_post]),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::Unchanged);
            assert_eq!(store.gap_marker_of("rust"), None, "放棄によって解決されるはず");
        }

        #[tokio::test]
        async fn test_unchanged_newer_mutates_nothing() {
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");
            let cached = make_post(1, 10, "2025-08-05T12:00:00Z");
            store.seed_post(Some(&tag), cached.clone());

            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(vec![cached]),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::Unchanged);
            assert_eq!(store.total_posts(), 1);
            assert_eq!(store.gap_marker_of("rust"), None);
        }

        #[tokio::test]
        async fn test_empty_batch_is_unchanged() {
            let store = MemoryStore::new();
            let tag = Tag::custom("rust");

            let outcome = reconcile(
                &store,
                &store,
                Some(&tag),
                UpdateAction::RequestNewer,
                Some(Vec::new()),
            )
            .await
            .unwrap();

            assert_eq!(outcome.result, UpdateResult::Unchanged);
            assert_eq!(store.total_posts(), 0);
        }
    }
}
