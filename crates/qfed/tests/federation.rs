use ckks_traits::{DeserializeParametrized, Serialize};
use qfed::{
    checkpoint_name, AggregationRound, ChunkedCipherCodec, Coordinator, CryptoConfig,
    CryptoContext, EncryptedParameterCollection, Error, FairnessWeighter, FederationConfig,
    JsonModelStore, LocalTrainer, ModelStore, ShapeTable, SyntheticTask,
};
use rand::{thread_rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::error::Error as StdError;
use std::sync::Arc;

fn config(q: f64) -> FederationConfig {
    FederationConfig {
        q,
        rounds: 2,
        num_users: 12,
        frac: 0.25,
        crypto: CryptoConfig {
            poly_modulus_degree: 128,
            ..CryptoConfig::default()
        },
        ..FederationConfig::default()
    }
}

fn task() -> SyntheticTask {
    let shapes = ShapeTable::from_shapes([
        ("conv.weight".to_string(), vec![2, 3, 3, 3]),
        ("conv.bias".to_string(), vec![2]),
        ("fc.weight".to_string(), vec![3, 40]),
        ("fc.bias".to_string(), vec![3]),
    ]);
    SyntheticTask::with_shapes(shapes, 5).unwrap()
}

#[test]
fn federation_end_to_end() -> Result<(), Box<dyn StdError>> {
    let task = task();
    let config = config(5.0);
    let mut coordinator = Coordinator::new(
        config.clone(),
        task.initial_global()?,
        task.trainer(0.3, 5),
        task.evaluator(),
    )?;
    assert!(coordinator.context().galois_keys().is_some());

    let summary = coordinator.run()?;
    assert_eq!(summary.rounds, 2);
    assert_eq!(coordinator.history().len(), 2);
    for record in coordinator.history().records() {
        assert!(record.variance >= 0.0);
        assert!(record.euclidean_distance >= 0.0);
        assert!((0.0..=100.0).contains(&record.mean_accuracy));
    }
    let json = serde_json::to_string(&summary)?;
    assert!(json.contains("average_variance"));

    let dir = tempfile::tempdir()?;
    let store = JsonModelStore::new(dir.path());
    let name = checkpoint_name(
        config.dataset,
        config.model,
        config.rounds,
        config.q,
        config.crypto.poly_modulus_degree,
    );
    assert_eq!(name, "mnist_mlp_2_q-fedavg_HE_5.0_degree=128_weights");
    store.save(&name, coordinator.global())?;
    assert_eq!(&store.load(&name)?, coordinator.global());
    Ok(())
}

#[test]
fn transmitted_updates() -> Result<(), Box<dyn StdError>> {
    let task = task();
    let config = config(2.0);
    let context = Arc::new(CryptoContext::new(&config.crypto, &mut thread_rng())?);
    let codec = ChunkedCipherCodec::new(&context);
    let global = task.initial_global()?;
    let shapes = ShapeTable::from_collection(&global);

    // The participant only sees the encrypted bytes of its update.
    let update = task.trainer(0.3, 5).train(4, &global)?;
    let bytes = codec.encrypt_collection(&update.collection)?.to_bytes();
    let received = EncryptedParameterCollection::from_bytes(&bytes, context.parameters())?;
    assert_eq!(received.len(), 4);
    // 120 values in 64 slots.
    assert_eq!(received.get("fc.weight").map(|c| c.len()), Some(2));

    let decrypted = codec.decrypt_collection(&received, &shapes)?;
    for (name, tensor) in update.collection.iter() {
        for (a, b) in tensor.iter().zip(decrypted[name].iter()) {
            assert!((a - b).abs() <= 1e-3);
        }
    }

    let other = CryptoContext::new(&config.crypto, &mut thread_rng())?;
    let foreign = ChunkedCipherCodec::new(&Arc::new(other));
    let garbled = foreign.decrypt_collection(&received, &shapes)?;
    assert!(garbled.iter().any(|(name, t)| t
        .iter()
        .zip(update.collection[name].iter())
        .any(|(a, b)| (a - b).abs() > 1.0)));
    Ok(())
}

#[test]
fn zero_q_is_a_uniform_average() -> Result<(), Box<dyn StdError>> {
    let task = task();
    let global = task.initial_global()?;
    let context = Arc::new(CryptoContext::new(&config(0.0).crypto, &mut thread_rng())?);

    let mut aggregated = vec![];
    for uniform in [false, true] {
        let weighter = FairnessWeighter::new(0.0)?.uniform_when_q_zero(uniform);
        let mut round = AggregationRound::new(0, ChunkedCipherCodec::new(&context), weighter);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        round.sample(12, 0.25, &mut rng)?;
        round.begin_collecting(&global)?;
        round.collect(&task.trainer(0.3, 5), &task.evaluator())?;
        aggregated.push(round.aggregate()?.clone());
    }

    let trainer = task.trainer(0.3, 5);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut round = AggregationRound::new(
        0,
        ChunkedCipherCodec::new(&context),
        FairnessWeighter::new(0.0)?,
    );
    let participants = round.sample(12, 0.25, &mut rng)?.to_vec();
    let updates = participants
        .iter()
        .map(|p| Ok(trainer.train(*p, &global)?.collection))
        .collect::<qfed::Result<Vec<_>>>()?;

    for (name, tensor) in aggregated[0].iter() {
        let flat = |c: &qfed::ParameterCollection| c[name].iter().copied().collect::<Vec<_>>();
        let uniform = flat(&aggregated[1]);
        let locals = updates.iter().map(flat).collect::<Vec<_>>();
        for (i, v) in tensor.iter().enumerate() {
            let mean = locals.iter().map(|u| u[i]).sum::<f64>() / locals.len() as f64;
            assert!((v - mean).abs() < 1e-6);
            assert!((v - uniform[i]).abs() < 1e-6);
        }
    }
    Ok(())
}

#[test]
fn invalid_configuration_is_rejected() {
    let task = task();
    let result = Coordinator::new(
        FederationConfig {
            crypto: CryptoConfig {
                poly_modulus_degree: 100,
                ..CryptoConfig::default()
            },
            ..config(1.0)
        },
        task.initial_global().unwrap(),
        task.trainer(0.1, 1),
        task.evaluator(),
    );
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}
