use serde::Serialize;
use tracing::info;

use concierge_core::domain::inventory::{InventoryKey, NewInventoryRecord};
use concierge_core::errors::SearchError;
use concierge_core::search::Embedder;

use crate::repositories::{InsertOutcome, InventoryRepository, RepositoryError};

pub const SEED_DATE: &str = "2025-04-12";

#[derive(Clone, Copy, Debug)]
pub struct SeedRoom {
    pub room_type: &'static str,
    pub available: u32,
    pub price: &'static str,
    pub description: &'static str,
}

/// Sample rooms for the demo hotel, all on [`SEED_DATE`].
pub const SEED_ROOMS: &[SeedRoom] = &[
    SeedRoom {
        room_type: "suite",
        available: 2,
        price: "$250",
        description: "キングサイズベッド、オーシャンビュー、エレガントな装飾を備えた広々とした豪華なスイートルーム。ロマンチックな休暇に最適です。",
    },
    SeedRoom {
        room_type: "double",
        available: 4,
        price: "$150",
        description: "モダンなデザインのデスクスペース付きの快適なダブルルーム。ビジネス旅行者やファミリーに理想的です。",
    },
    SeedRoom {
        room_type: "single",
        available: 5,
        price: "$120",
        description: "一人旅に最適な居心地の良いシングルルーム。読書コーナー、コンパクトなワークスペース、中庭の眺めが含まれます。",
    },
    SeedRoom {
        room_type: "loft",
        available: 3,
        price: "$300",
        description: "インダストリアルな雰囲気、むき出しのレンガ、フルキッチンを備えたスタイリッシュなオープンプランロフト。クリエイティブな隠れ家に最適です。",
    },
    SeedRoom {
        room_type: "penthouse",
        available: 1,
        price: "$500",
        description: "スカイラインビュー、プライベートバルコニー、ジャグジー、VIPアメニティ付きのプレミアムペントハウススイート。",
    },
    SeedRoom {
        room_type: "family",
        available: 3,
        price: "$200",
        description: "クイーンベッド2台、子供向けの装飾、小さなプレイエリアを備えた大きなファミリースイート。",
    },
    SeedRoom {
        room_type: "garden",
        available: 2,
        price: "$180",
        description: "パティオアクセス、自然光、読書やヨガに最適なリラックスした雰囲気の静かなガーデンビュールーム。",
    },
    SeedRoom {
        room_type: "executive",
        available: 2,
        price: "$220",
        description: "プライベートオフィススペース、人間工学に基づいた椅子、エスプレッソマシン、通話用防音設備を備えたエグゼクティブスイート。",
    },
    SeedRoom {
        room_type: "accessible",
        available: 2,
        price: "$140",
        description: "ウォークインシャワー、手すり、移動のための追加フロアスペースを備えた車椅子対応ルーム。",
    },
    SeedRoom {
        room_type: "eco",
        available: 2,
        price: "$160",
        description: "リサイクル素材、ゼロウェイストアメニティ、緑の屋上庭園の眺めを備えたエコフレンドリールーム。",
    },
];

impl SeedRoom {
    pub fn key(&self) -> Result<InventoryKey, RepositoryError> {
        Ok(InventoryKey::parse(self.room_type, SEED_DATE)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("could not embed description for `{room_type}`: {source}")]
    Embedding { room_type: String, source: SearchError },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SeedResult {
    pub inserted: Vec<String>,
    pub already_present: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

/// Demo room inventory, loaded once per key.
///
/// Loading is idempotent: keys that already exist are left untouched, so a
/// re-seed never resets availability that bookings have consumed.
pub struct SeedDataset;

impl SeedDataset {
    pub async fn load<R, E>(repository: &R, embedder: &E) -> Result<SeedResult, SeedError>
    where
        R: InventoryRepository + ?Sized,
        E: Embedder + ?Sized,
    {
        let mut result = SeedResult::default();

        for room in SEED_ROOMS {
            let key = room.key()?;
            if repository.find(&key).await?.is_some() {
                result.already_present.push(key.record_id());
                continue;
            }

            let embedding = embedder.embed(room.description).await.map_err(|source| {
                SeedError::Embedding { room_type: room.room_type.to_string(), source }
            })?;

            let outcome = repository
                .insert_if_absent(NewInventoryRecord {
                    key: key.clone(),
                    available: room.available,
                    price: room.price.to_string(),
                    description: room.description.to_string(),
                    embedding,
                })
                .await?;

            match outcome {
                InsertOutcome::Inserted => result.inserted.push(key.record_id()),
                InsertOutcome::AlreadyPresent => result.already_present.push(key.record_id()),
            }
        }

        info!(
            event_name = "inventory.seed.loaded",
            inserted = result.inserted.len(),
            already_present = result.already_present.len(),
            "seed dataset loaded"
        );
        Ok(result)
    }

    /// Every seed key exists exactly once with its description intact.
    pub async fn verify<R>(repository: &R) -> Result<VerificationResult, RepositoryError>
    where
        R: InventoryRepository + ?Sized,
    {
        let records = repository.list().await?;
        let mut checks = Vec::with_capacity(SEED_ROOMS.len());

        for room in SEED_ROOMS {
            let key = room.key()?;
            let matching: Vec<_> = records.iter().filter(|record| record.key == key).collect();
            let ok = matching.len() == 1 && matching[0].description == room.description;
            checks.push((key.record_id(), ok));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}
