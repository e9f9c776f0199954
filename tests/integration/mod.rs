mod room_lifecycle;
