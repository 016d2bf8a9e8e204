use glam::Vec2;
use kestrel_stage::geometry::{Circle, Shape, WidthLine};
use kestrel_stage::intersection::{
    ContactKind, IntersectionManager, IntersectionTarget, TargetCategory, TargetFlags, TargetLifetime,
};
use kestrel_stage::stage::ObjectId;

fn circle(x: f32, y: f32, r: f32) -> Shape {
    Shape::Circle(Circle::new(x, y, r))
}

#[test]
fn player_hit_by_enemy_shot_is_recorded_on_both_sides() {
    let mut manager = IntersectionManager::new(32.0);
    let player = manager.register_owner(ObjectId(1));
    let shot = manager.register_owner(ObjectId(2));
    manager.add_target(IntersectionTarget::new(circle(100.0, 100.0, 2.0), TargetCategory::Player).with_owner(player));
    manager.add_target(IntersectionTarget::new(circle(103.0, 100.0, 4.0), TargetCategory::EnemyShot).with_owner(shot));

    let contacts = manager.run_pass();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].kind, ContactKind::PlayerHit);
    assert_eq!(contacts[0].subject, Some(ObjectId(1)));
    assert_eq!(contacts[0].source, Some(ObjectId(2)));
    assert_eq!(manager.intersected_with(ObjectId(1)), &[ObjectId(2)]);
    assert_eq!(manager.intersected_with(ObjectId(2)), &[ObjectId(1)]);
}

#[test]
fn released_owners_take_their_targets_with_them() {
    let mut manager = IntersectionManager::new(32.0);
    let enemy = manager.register_owner(ObjectId(5));
    let shot = manager.register_owner(ObjectId(6));
    manager.add_enemy_target_to_shot(
        IntersectionTarget::new(circle(50.0, 50.0, 10.0), TargetCategory::Enemy).with_owner(enemy),
        TargetLifetime::Persistent,
    );
    manager.add_persistent_target(
        IntersectionTarget::new(circle(52.0, 50.0, 4.0), TargetCategory::PlayerShot).with_owner(shot),
    );
    assert_eq!(manager.registered_enemy_ids(), vec![ObjectId(5)]);

    manager.release_owner(enemy);
    assert!(!manager.owner_alive(enemy));
    assert!(manager.registered_enemy_ids().is_empty());
    assert!(manager.run_pass().is_empty());
    assert_eq!(manager.live_target_count(), 1);
}

#[test]
fn ownerless_eraser_reports_no_source() {
    let mut manager = IntersectionManager::new(32.0);
    let shot = manager.register_owner(ObjectId(9));
    manager.add_target(IntersectionTarget::new(circle(200.0, 200.0, 6.0), TargetCategory::EnemyShot).with_owner(shot));
    manager.add_target(
        IntersectionTarget::new(circle(205.0, 200.0, 20.0), TargetCategory::PlayerShot)
            .with_flags(TargetFlags::ERASE_SHOT),
    );

    let contacts = manager.run_pass();
    let erased: Vec<_> = contacts.iter().filter(|c| c.kind == ContactKind::ShotErased).collect();
    assert_eq!(erased.len(), 1);
    assert_eq!(erased[0].subject, Some(ObjectId(9)));
    assert_eq!(erased[0].source, None);
    assert!(manager.intersected_with(ObjectId(9)).is_empty());
}

#[test]
fn one_contact_per_pair_even_with_several_hitboxes() {
    let mut manager = IntersectionManager::new(16.0);
    let enemy = manager.register_owner(ObjectId(3));
    let shot = manager.register_owner(ObjectId(4));
    for offset in [0.0, 4.0, 8.0] {
        manager.add_enemy_target_to_shot(
            IntersectionTarget::new(circle(60.0 + offset, 60.0, 8.0), TargetCategory::Enemy).with_owner(enemy),
            TargetLifetime::Frame(0),
        );
    }
    let beam = WidthLine::new(40.0, 60.0, 90.0, 60.0, 6.0);
    manager.add_target(IntersectionTarget::new(Shape::Line(beam), TargetCategory::PlayerShot).with_owner(shot));

    let contacts = manager.run_pass();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].kind, ContactKind::EnemyHitByShot);
    assert_eq!(contacts[0].subject, Some(ObjectId(3)));
}

#[test]
fn same_owner_never_collides_with_itself() {
    let mut manager = IntersectionManager::new(32.0);
    let owner = manager.register_owner(ObjectId(12));
    manager.add_target(IntersectionTarget::new(circle(10.0, 10.0, 5.0), TargetCategory::Player).with_owner(owner));
    manager.add_target(IntersectionTarget::new(circle(10.0, 10.0, 5.0), TargetCategory::EnemyShot).with_owner(owner));
    assert!(manager.run_pass().is_empty());
}

#[test]
fn graze_contacts_name_the_player() {
    let mut manager = IntersectionManager::new(32.0);
    let player = manager.register_owner(ObjectId(1));
    let shot = manager.register_owner(ObjectId(20));
    manager.add_target(IntersectionTarget::new(circle(0.0, 0.0, 24.0), TargetCategory::PlayerGraze).with_owner(player));
    manager.add_target(IntersectionTarget::new(circle(20.0, 0.0, 3.0), TargetCategory::EnemyShot).with_owner(shot));
    let contacts = manager.run_pass();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].kind, ContactKind::PlayerGraze);
    assert_eq!((contacts[0].subject, contacts[0].source), (Some(ObjectId(1)), Some(ObjectId(20))));
}

#[test]
fn nearest_enemy_points_come_back_closest_first() {
    let mut manager = IntersectionManager::new(32.0);
    for (id, x) in [(1, 300.0), (2, 100.0), (3, 200.0)] {
        let owner = manager.register_owner(ObjectId(id));
        manager.add_enemy_target_to_shot(
            IntersectionTarget::new(circle(x, 0.0, 8.0), TargetCategory::Enemy)
                .with_owner(owner)
                .with_flags(TargetFlags::FETCH_POSITION),
            TargetLifetime::Persistent,
        );
    }
    let hidden = manager.register_owner(ObjectId(4));
    manager.add_enemy_target_to_shot(
        IntersectionTarget::new(circle(0.0, 0.0, 8.0), TargetCategory::Enemy).with_owner(hidden),
        TargetLifetime::Persistent,
    );

    let points = manager.nearest_enemy_points(Vec2::ZERO, 2);
    assert_eq!(points, vec![Vec2::new(100.0, 0.0), Vec2::new(200.0, 0.0)]);
    assert_eq!(manager.registered_enemy_ids(), vec![ObjectId(1), ObjectId(2), ObjectId(3), ObjectId(4)]);
}
